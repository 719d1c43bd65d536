//! Single-asset upload with bounded retries, plus the skip-existing check.

use crate::error::Error;
use crate::models::{FileAsset, MigrationRecord, MigrationStatus, DRY_RUN_ETAG};
use crate::scanner::mime;
use crate::storage::{ObjectStore, PutObject};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Attempt budget and exponential backoff (no jitter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// At least one attempt is always made.
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after failed attempt `attempt` (1-based): 1s, 2s, 4s, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(exponent)
    }
}

/// Source of backoff waits, swapped for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Notification emitted around each upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent<'a> {
    Started { attempt: u32 },
    Failed { attempt: u32, error: &'a str },
}

pub type AttemptObserver<'a> = &'a (dyn Fn(AttemptEvent<'_>) + Send + Sync);

/// Upload one asset. Dry runs never touch the store.
pub async fn upload_asset(
    store: &dyn ObjectStore,
    bucket: &str,
    asset: &FileAsset,
    dry_run: bool,
) -> Result<String, Error> {
    if dry_run {
        info!(
            "[DRY RUN] Would upload: {} -> {}",
            asset.local_path.display(),
            asset.remote_key
        );
        return Ok(DRY_RUN_ETAG.to_string());
    }

    store
        .put_object(
            bucket,
            PutObject {
                key: asset.remote_key.clone(),
                local_path: asset.local_path.clone(),
                content_type: asset.mime_type.clone(),
                cache_control: mime::cache_control().to_string(),
                content_length: asset.size_bytes,
            },
        )
        .await
}

/// Upload with retries, always producing a terminal record.
///
/// `uploadStartedAt` is stamped once before the first attempt. Each attempt
/// moves the record to `uploading`; a success returns immediately, and the
/// last failure is recorded as `failed` with its error message.
pub async fn upload_with_retry(
    store: &dyn ObjectStore,
    bucket: &str,
    asset: &FileAsset,
    policy: &RetryPolicy,
    dry_run: bool,
    sleeper: &dyn Sleeper,
    observer: AttemptObserver<'_>,
) -> MigrationRecord {
    let mut record = MigrationRecord::pending(asset.clone());
    record.upload_started_at = Some(Utc::now());

    let budget = policy.attempt_budget();
    for attempt in 1..=budget {
        record.attempts = attempt;
        record.status = MigrationStatus::Uploading;
        observer(AttemptEvent::Started { attempt });

        match upload_asset(store, bucket, asset, dry_run).await {
            Ok(etag) => {
                record.status = MigrationStatus::Success;
                record.upload_completed_at = Some(Utc::now());
                record.etag = Some(etag);
                return record;
            }
            Err(err) => {
                let message = err.to_string();
                observer(AttemptEvent::Failed {
                    attempt,
                    error: &message,
                });

                if attempt == budget {
                    record.status = MigrationStatus::Failed;
                    record.upload_completed_at = Some(Utc::now());
                    record.error_message = Some(message);
                    return record;
                }

                let delay = policy.backoff_delay(attempt);
                warn!(
                    "[Attempt {}/{}] Upload failed for {}: {}. Retrying in {}ms...",
                    attempt,
                    budget,
                    asset.remote_key,
                    message,
                    delay.as_millis()
                );
                sleeper.sleep(delay).await;
            }
        }
    }

    record
}

/// With `skip_existing`, return a `skipped` record when the object is
/// already present. Existence is not compared against the local checksum.
pub async fn check_skip(
    store: &dyn ObjectStore,
    bucket: &str,
    asset: &FileAsset,
    skip_existing: bool,
) -> Result<Option<MigrationRecord>, Error> {
    if !skip_existing {
        return Ok(None);
    }

    if store.head_object(bucket, &asset.remote_key).await? {
        return Ok(Some(MigrationRecord::skipped(asset.clone(), Utc::now())));
    }

    Ok(None)
}
