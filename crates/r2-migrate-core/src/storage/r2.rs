//! Cloudflare R2 backend over the S3 API.

use super::{ObjectStore, PutObject};
use crate::config::R2Config;
use crate::error::Error;
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::{debug, trace};

/// Large videos can take minutes to upload. A timeout is a failed attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct R2Store {
    client: Client,
}

impl R2Store {
    pub async fn new(config: &R2Config) -> Self {
        let creds = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2-static",
        );

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(REQUEST_TIMEOUT)
            .build();

        // R2 ignores the region but the signer needs one.
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(config.endpoint())
            .credentials_provider(creds)
            .timeout_config(timeouts)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        debug!("R2 client configured for endpoint {}", config.endpoint());

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

fn http_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

#[async_trait]
impl ObjectStore for R2Store {
    async fn probe_connectivity(&self, bucket: &str) -> Result<(), Error> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) => match http_status(&err) {
                Some(404) => Err(Error::BucketNotFound(bucket.to_string())),
                Some(403) => Err(Error::AccessDenied(bucket.to_string())),
                _ => Err(Error::Connectivity(DisplayErrorContext(&err).to_string())),
            },
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, Error> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_not_found =
                    matches!(&err, SdkError::ServiceError(se) if se.err().is_not_found());
                if service_not_found || http_status(&err) == Some(404) {
                    trace!("{} not present in {}", key, bucket);
                    Ok(false)
                } else {
                    Err(Error::Storage(format!(
                        "head {}: {}",
                        key,
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }
    }

    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<String, Error> {
        let body = ByteStream::from_path(&object.local_path)
            .await
            .map_err(|e| {
                Error::Storage(format!("failed to open {}: {}", object.local_path.display(), e))
            })?;

        let content_length = i64::try_from(object.content_length)
            .map_err(|_| Error::Storage(format!("{} is too large", object.key)))?;

        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(&object.key)
            .body(body)
            .content_type(&object.content_type)
            .cache_control(&object.cache_control)
            .content_length(content_length)
            .send()
            .await
            .map_err(|err| {
                Error::Storage(format!("put {}: {}", object.key, DisplayErrorContext(&err)))
            })?;

        match response.e_tag() {
            Some(etag) => Ok(etag.to_string()),
            None => Err(Error::Storage(format!(
                "Upload succeeded but no ETag returned for {}",
                object.key
            ))),
        }
    }
}
