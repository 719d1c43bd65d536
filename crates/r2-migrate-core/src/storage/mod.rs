//! Object storage boundary.
//!
//! `ObjectStore` is the only way the migration talks to the remote bucket,
//! which keeps retry, skip and orchestration logic testable against fakes.

pub mod r2;

use crate::error::Error;
use async_trait::async_trait;
use std::path::PathBuf;

pub use r2::R2Store;

/// A single object upload: the local file is streamed as the body.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub local_path: PathBuf,
    pub content_type: String,
    pub cache_control: String,
    pub content_length: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Verify the bucket exists and the credentials can reach it.
    async fn probe_connectivity(&self, bucket: &str) -> Result<(), Error>;

    /// Whether an object exists under `key`. Not-found is `Ok(false)`.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, Error>;

    /// Upload the object and return the ETag reported by the store.
    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<String, Error>;
}
