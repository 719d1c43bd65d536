//! Append-only JSON-Lines record of migration events.

use crate::error::Error;
use crate::models::MigrationSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MigrationEvent {
    #[serde(rename_all = "camelCase")]
    MigrationStarted {
        files_count: usize,
        total_bytes: u64,
    },
    #[serde(rename_all = "camelCase")]
    UploadStarted { remote_key: String, attempt: u32 },
    #[serde(rename_all = "camelCase")]
    UploadSuccess {
        remote_key: String,
        size_bytes: u64,
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    UploadFailed {
        remote_key: String,
        attempt: u32,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    UploadSkipped { remote_key: String, reason: String },
    /// The existence check for `--skip-existing` failed, so the asset is
    /// uploaded without knowing whether it was already present.
    #[serde(rename_all = "camelCase")]
    SkipCheckFailed { remote_key: String, error: String },
    #[serde(rename_all = "camelCase")]
    BatchCompleted {
        batch_number: usize,
        files_in_batch: usize,
    },
    MigrationCompleted { summary: MigrationSummary },
    MigrationError {
        error: String,
        stack: Option<String>,
    },
}

impl MigrationEvent {
    /// The asset a per-asset event refers to.
    pub fn remote_key(&self) -> Option<&str> {
        match self {
            MigrationEvent::UploadStarted { remote_key, .. }
            | MigrationEvent::UploadSuccess { remote_key, .. }
            | MigrationEvent::UploadFailed { remote_key, .. }
            | MigrationEvent::UploadSkipped { remote_key, .. }
            | MigrationEvent::SkipCheckFailed { remote_key, .. } => Some(remote_key),
            _ => None,
        }
    }
}

/// One line of the log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(flatten)]
    pub event: MigrationEvent,
    pub timestamp: DateTime<Utc>,
    pub migration_id: Uuid,
}

/// Writes one JSON object per event. Write failures are reported through
/// `tracing` and never returned to the caller.
pub struct MigrationLogger {
    path: PathBuf,
    migration_id: Uuid,
    write_lock: Mutex<()>,
}

impl MigrationLogger {
    pub fn new(path: impl Into<PathBuf>, migration_id: Uuid) -> Self {
        Self {
            path: path.into(),
            migration_id,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn migration_id(&self) -> Uuid {
        self.migration_id
    }

    pub async fn log(&self, event: MigrationEvent) {
        let entry = LogEntry {
            event,
            timestamp: Utc::now(),
            migration_id: self.migration_id,
        };

        let mut line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize log entry: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(line.as_bytes()).await {
            error!(
                "Failed to write to log file {}: {}",
                self.path.display(),
                e
            );
        }
    }

    async fn append(&self, bytes: &[u8]) -> io::Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await
    }

    pub async fn log_migration_started(&self, files_count: usize, total_bytes: u64) {
        self.log(MigrationEvent::MigrationStarted {
            files_count,
            total_bytes,
        })
        .await;
    }

    pub async fn log_upload_started(&self, remote_key: &str, attempt: u32) {
        self.log(MigrationEvent::UploadStarted {
            remote_key: remote_key.to_string(),
            attempt,
        })
        .await;
    }

    pub async fn log_upload_success(&self, remote_key: &str, size_bytes: u64, duration_ms: u64) {
        self.log(MigrationEvent::UploadSuccess {
            remote_key: remote_key.to_string(),
            size_bytes,
            duration_ms,
        })
        .await;
    }

    pub async fn log_upload_failed(&self, remote_key: &str, attempt: u32, error: &str) {
        self.log(MigrationEvent::UploadFailed {
            remote_key: remote_key.to_string(),
            attempt,
            error: error.to_string(),
        })
        .await;
    }

    pub async fn log_upload_skipped(&self, remote_key: &str, reason: &str) {
        self.log(MigrationEvent::UploadSkipped {
            remote_key: remote_key.to_string(),
            reason: reason.to_string(),
        })
        .await;
    }

    pub async fn log_skip_check_failed(&self, remote_key: &str, error: &str) {
        self.log(MigrationEvent::SkipCheckFailed {
            remote_key: remote_key.to_string(),
            error: error.to_string(),
        })
        .await;
    }

    pub async fn log_batch_completed(&self, batch_number: usize, files_in_batch: usize) {
        self.log(MigrationEvent::BatchCompleted {
            batch_number,
            files_in_batch,
        })
        .await;
    }

    pub async fn log_migration_completed(&self, summary: &MigrationSummary) {
        self.log(MigrationEvent::MigrationCompleted {
            summary: summary.clone(),
        })
        .await;
    }

    pub async fn log_migration_error(&self, err: &Error) {
        let stack = std::error::Error::source(err).map(|source| source.to_string());
        self.log(MigrationEvent::MigrationError {
            error: err.to_string(),
            stack,
        })
        .await;
    }
}

/// Parse a log file back into entries, skipping blank lines.
pub async fn read_log(path: &Path) -> Result<Vec<LogEntry>, Error> {
    let contents = fs::read_to_string(path).await?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}
