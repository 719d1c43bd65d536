#![allow(dead_code)]

use async_trait::async_trait;
use r2_migrate_core::models::{AssetCategory, FileAsset};
use r2_migrate_core::storage::{ObjectStore, PutObject};
use r2_migrate_core::uploader::Sleeper;
use r2_migrate_core::{Error, MigrateSettings, R2Config};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory bucket with scripted failures and call accounting.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<HashSet<String>>,
    /// Remaining failures per key; `u32::MAX` never recovers.
    failures: Mutex<HashMap<String, u32>>,
    broken_heads: Mutex<HashSet<String>>,
    missing_bucket: bool,
    put_delay: Duration,
    pub put_calls: AtomicUsize,
    pub head_calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_put_delay(delay: Duration) -> Self {
        Self {
            put_delay: delay,
            ..Self::default()
        }
    }

    pub fn without_bucket() -> Self {
        Self {
            missing_bucket: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, key: &str) {
        self.objects.lock().unwrap().insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains(key)
    }

    pub fn fail_times(&self, key: &str, times: u32) {
        self.failures.lock().unwrap().insert(key.to_string(), times);
    }

    pub fn fail_always(&self, key: &str) {
        self.fail_times(key, u32::MAX);
    }

    pub fn break_head(&self, key: &str) {
        self.broken_heads.lock().unwrap().insert(key.to_string());
    }

    pub fn puts(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn heads(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn take_failure(&self, key: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(key) {
            Some(0) | None => false,
            Some(remaining) => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn probe_connectivity(&self, bucket: &str) -> Result<(), Error> {
        if self.missing_bucket {
            return Err(Error::BucketNotFound(bucket.to_string()));
        }
        Ok(())
    }

    async fn head_object(&self, _bucket: &str, key: &str) -> Result<bool, Error> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_heads.lock().unwrap().contains(key) {
            return Err(Error::Storage(format!("head {}: connection reset", key)));
        }
        Ok(self.contains(key))
    }

    async fn put_object(&self, _bucket: &str, object: PutObject) -> Result<String, Error> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.put_delay.is_zero() {
            tokio::time::sleep(self.put_delay).await;
        }

        let result = if self.take_failure(&object.key) {
            Err(Error::Storage(format!("put {}: service unavailable", object.key)))
        } else {
            self.insert(&object.key);
            Ok(format!("\"etag-{}\"", object.key))
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Records requested waits and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

pub fn synthetic_asset(key: &str) -> FileAsset {
    FileAsset {
        local_path: PathBuf::from("/site/public").join(key),
        remote_key: key.to_string(),
        size_bytes: 1024,
        mime_type: "image/png".to_string(),
        checksum: "0".repeat(64),
        category: AssetCategory::Image,
    }
}

pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

pub fn r2_config() -> R2Config {
    R2Config {
        account_id: "0123456789abcdef0123456789abcdef".to_string(),
        access_key_id: "test-access-key".to_string(),
        secret_access_key: "test-secret".to_string(),
        bucket_name: "media-test".to_string(),
        endpoint_override: None,
        public_url: Some("https://cdn.example.com".to_string()),
    }
}

/// Settings rooted in `site`, writing the manifest and log under `state`.
pub fn settings(site: &Path, sources: &[&str], state: &Path) -> MigrateSettings {
    let public = site.join("public");
    MigrateSettings {
        source_paths: sources
            .iter()
            .map(|s| public.join(s).to_string_lossy().into_owned())
            .collect(),
        public_dir: public.to_string_lossy().into_owned(),
        ignore_patterns: vec![],
        concurrency: 4,
        max_retries: 3,
        batch_size: None,
        skip_existing: true,
        dry_run: false,
        manifest_path: state.join("manifest.json").to_string_lossy().into_owned(),
        log_path: state.join("log.jsonl").to_string_lossy().into_owned(),
    }
}
