use crate::config::MigrationConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// ETag recorded for assets skipped because the object already exists.
pub const SKIPPED_ETAG: &str = "skipped";

/// ETag synthesized for dry-run uploads.
pub const DRY_RUN_ETAG: &str = "dry-run-etag";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Image,
    Video,
}

/// A local file to migrate, snapshotted at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAsset {
    pub local_path: PathBuf,
    /// Object key: path relative to the public directory, `/`-separated.
    pub remote_key: String,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Lowercase hex SHA-256 of the file contents.
    pub checksum: String,
    pub category: AssetCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Pending,
    Uploading,
    Success,
    Failed,
    Skipped,
}

impl MigrationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MigrationStatus::Success | MigrationStatus::Failed | MigrationStatus::Skipped
        )
    }
}

/// Per-asset migration state. `id` is the asset's remote key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub id: String,
    pub asset: FileAsset,
    pub status: MigrationStatus,
    pub upload_started_at: Option<DateTime<Utc>>,
    pub upload_completed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub etag: Option<String>,
}

impl MigrationRecord {
    pub fn pending(asset: FileAsset) -> Self {
        Self {
            id: asset.remote_key.clone(),
            asset,
            status: MigrationStatus::Pending,
            upload_started_at: None,
            upload_completed_at: None,
            attempts: 0,
            error_message: None,
            etag: None,
        }
    }

    pub fn skipped(asset: FileAsset, checked_at: DateTime<Utc>) -> Self {
        Self {
            id: asset.remote_key.clone(),
            asset,
            status: MigrationStatus::Skipped,
            upload_started_at: Some(checked_at),
            upload_completed_at: Some(checked_at),
            attempts: 0,
            error_message: None,
            etag: Some(SKIPPED_ETAG.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub total_files: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub total_bytes_uploaded: u64,
    pub duration_ms: u64,
    pub average_speed_bytes_per_sec: f64,
}

/// Run-level ledger, one per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationManifest {
    pub migration_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub target_bucket: String,
    pub source_paths: Vec<String>,
    pub summary: MigrationSummary,
    pub records: BTreeMap<String, MigrationRecord>,
    pub config: MigrationConfig,
}

/// Live, non-persisted view of upload progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub current_file: Option<String>,
    pub completed: usize,
    pub total: usize,
    pub percent_complete: u32,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub current_speed_bytes_per_sec: f64,
    /// `None` while throughput is still zero.
    pub estimated_seconds_remaining: Option<u64>,
}
