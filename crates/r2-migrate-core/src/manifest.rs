use crate::config::MigrationConfig;
use crate::error::Error;
use crate::hasher::checksums_match;
use crate::models::{
    FileAsset, MigrationManifest, MigrationRecord, MigrationStatus, MigrationSummary,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

/// Start a manifest for one run with every asset `pending`. The id is the
/// run's migration id, shared with the event log.
pub fn create_manifest(
    migration_id: Uuid,
    config: MigrationConfig,
    source_paths: Vec<String>,
    assets: &[FileAsset],
) -> MigrationManifest {
    let records: BTreeMap<String, MigrationRecord> = assets
        .iter()
        .map(|asset| (asset.remote_key.clone(), MigrationRecord::pending(asset.clone())))
        .collect();

    MigrationManifest {
        migration_id,
        started_at: Utc::now(),
        completed_at: None,
        target_bucket: config.bucket_name.clone(),
        source_paths,
        summary: MigrationSummary {
            total_files: records.len(),
            ..MigrationSummary::default()
        },
        records,
        config,
    }
}

/// Store `record` and rebuild the summary counters from every record, so
/// the summary can never drift from record state.
pub fn update_record(manifest: &mut MigrationManifest, record: MigrationRecord) {
    manifest.records.insert(record.id.clone(), record);
    recompute_summary(manifest);
}

fn recompute_summary(manifest: &mut MigrationManifest) {
    let summary = &mut manifest.summary;
    summary.total_files = manifest.records.len();
    summary.success_count = 0;
    summary.failed_count = 0;
    summary.skipped_count = 0;
    summary.total_bytes_uploaded = 0;

    for record in manifest.records.values() {
        match record.status {
            MigrationStatus::Success => {
                summary.success_count += 1;
                summary.total_bytes_uploaded += record.asset.size_bytes;
            }
            MigrationStatus::Failed => summary.failed_count += 1,
            MigrationStatus::Skipped => summary.skipped_count += 1,
            MigrationStatus::Pending | MigrationStatus::Uploading => {}
        }
    }
}

pub fn finalize_manifest(manifest: &mut MigrationManifest, started: Instant) {
    manifest.completed_at = Some(Utc::now());

    let elapsed = started.elapsed();
    manifest.summary.duration_ms = elapsed.as_millis() as u64;

    let elapsed_secs = elapsed.as_secs_f64();
    manifest.summary.average_speed_bytes_per_sec = if elapsed_secs > f64::EPSILON {
        manifest.summary.total_bytes_uploaded as f64 / elapsed_secs
    } else {
        0.0
    };
}

/// Write the manifest as pretty JSON. Unlike the event log, failures here
/// are returned: the manifest is the recovery artifact.
pub async fn save_manifest(manifest: &MigrationManifest, path: &Path) -> Result<(), Error> {
    let write_err = |source| Error::ManifestWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(path, json).await.map_err(write_err)?;

    info!("Manifest saved: {}", path.display());
    Ok(())
}

pub async fn load_manifest(path: &Path) -> Result<MigrationManifest, Error> {
    let json = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&json)?)
}

fn records_with_status(
    manifest: &MigrationManifest,
    status: MigrationStatus,
) -> Vec<&MigrationRecord> {
    manifest
        .records
        .values()
        .filter(|record| record.status == status)
        .collect()
}

pub fn failed_records(manifest: &MigrationManifest) -> Vec<&MigrationRecord> {
    records_with_status(manifest, MigrationStatus::Failed)
}

pub fn successful_records(manifest: &MigrationManifest) -> Vec<&MigrationRecord> {
    records_with_status(manifest, MigrationStatus::Success)
}

pub fn skipped_records(manifest: &MigrationManifest) -> Vec<&MigrationRecord> {
    records_with_status(manifest, MigrationStatus::Skipped)
}

/// Assets that still need uploading after a previous run. An asset is
/// dropped only when the previous manifest shows it migrated (success or
/// skipped) with the same local checksum it has now.
pub fn resume_candidates(previous: &MigrationManifest, assets: Vec<FileAsset>) -> Vec<FileAsset> {
    assets
        .into_iter()
        .filter(|asset| match previous.records.get(&asset.remote_key) {
            Some(record) => {
                let migrated = matches!(
                    record.status,
                    MigrationStatus::Success | MigrationStatus::Skipped
                );
                !(migrated && checksums_match(&record.asset.checksum, &asset.checksum))
            }
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetCategory, SKIPPED_ETAG};
    use std::path::PathBuf;
    use std::time::Duration;

    fn asset(key: &str, size: u64) -> FileAsset {
        FileAsset {
            local_path: PathBuf::from("/public").join(key),
            remote_key: key.to_string(),
            size_bytes: size,
            mime_type: "image/png".to_string(),
            checksum: format!("{:064x}", size),
            category: AssetCategory::Image,
        }
    }

    fn config() -> MigrationConfig {
        MigrationConfig {
            account_id: "acct".to_string(),
            bucket_name: "media".to_string(),
            public_url: None,
            concurrency: 4,
            max_retries: 3,
            dry_run: false,
            skip_existing: true,
            batch_size: None,
            created_at: Utc::now(),
        }
    }

    fn manifest_for(assets: &[FileAsset]) -> MigrationManifest {
        create_manifest(Uuid::new_v4(), config(), vec![], assets)
    }

    fn with_status(asset: FileAsset, status: MigrationStatus) -> MigrationRecord {
        let mut record = MigrationRecord::pending(asset);
        record.status = status;
        record
    }

    #[test]
    fn test_create_manifest_starts_pending() {
        let id = Uuid::new_v4();
        let assets = vec![asset("imgs/a.png", 10), asset("imgs/b.png", 20)];
        let sources = vec!["public/imgs".to_string()];
        let manifest = create_manifest(id, config(), sources, &assets);

        assert_eq!(manifest.migration_id, id);
        assert_eq!(manifest.target_bucket, "media");
        assert_eq!(manifest.source_paths, vec!["public/imgs"]);
        assert_eq!(manifest.summary.total_files, 2);
        assert_eq!(manifest.summary.success_count, 0);
        assert!(manifest.completed_at.is_none());
        assert!(manifest
            .records
            .values()
            .all(|r| r.status == MigrationStatus::Pending));
    }

    #[test]
    fn test_summary_recomputed_from_records() {
        let assets: Vec<FileAsset> = (1..=10)
            .map(|i| asset(&format!("imgs/{i}.png"), i * 100))
            .collect();
        let mut manifest = manifest_for(&assets);

        for (i, a) in assets.iter().enumerate() {
            let status = match i {
                0..=6 => MigrationStatus::Success,
                7 | 8 => MigrationStatus::Failed,
                _ => MigrationStatus::Skipped,
            };
            update_record(&mut manifest, with_status(a.clone(), status));
        }

        let expected_bytes: u64 = (1..=7).map(|i| i * 100).sum();
        let s = &manifest.summary;
        assert_eq!(s.total_files, 10);
        assert_eq!(s.success_count, 7);
        assert_eq!(s.failed_count, 2);
        assert_eq!(s.skipped_count, 1);
        assert_eq!(s.total_bytes_uploaded, expected_bytes);

        // Re-applying a record for the same key replaces rather than double counts.
        let first = assets[0].clone();
        update_record(&mut manifest, with_status(first, MigrationStatus::Failed));
        assert_eq!(manifest.summary.success_count, 6);
        assert_eq!(manifest.summary.failed_count, 3);
        assert_eq!(failed_records(&manifest).len(), 3);
        assert_eq!(successful_records(&manifest).len(), 6);
        assert_eq!(skipped_records(&manifest).len(), 1);
    }

    #[test]
    fn test_finalize_handles_instant_runs() {
        let mut manifest = manifest_for(&[]);
        finalize_manifest(&mut manifest, Instant::now());
        assert!(manifest.completed_at.is_some());
        assert!(manifest.summary.average_speed_bytes_per_sec.is_finite());
    }

    #[test]
    fn test_finalize_computes_throughput() {
        let a = asset("imgs/a.png", 1_000_000);
        let mut manifest = manifest_for(&[a.clone()]);
        update_record(&mut manifest, with_status(a, MigrationStatus::Success));

        let started = Instant::now() - Duration::from_secs(2);
        finalize_manifest(&mut manifest, started);
        assert!(manifest.summary.duration_ms >= 2000);
        let speed = manifest.summary.average_speed_bytes_per_sec;
        assert!(speed > 0.0 && speed <= 500_000.0);
    }

    #[tokio::test]
    async fn test_save_and_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("manifest.json");
        let a = asset("imgs/a.png", 42);
        let mut manifest = manifest_for(&[a.clone()]);
        update_record(&mut manifest, MigrationRecord::skipped(a, Utc::now()));

        save_manifest(&manifest, &path).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"migrationId\""));
        assert!(raw.contains("\"skippedCount\": 1"));

        let loaded = load_manifest(&path).await.unwrap();
        assert_eq!(loaded.migration_id, manifest.migration_id);
        assert_eq!(
            loaded.records["imgs/a.png"].etag.as_deref(),
            Some(SKIPPED_ETAG)
        );
    }

    #[tokio::test]
    async fn test_save_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let manifest = manifest_for(&[]);
        let err = save_manifest(&manifest, &blocker.join("manifest.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ManifestWrite { .. }));
    }

    #[test]
    fn test_resume_candidates_requires_matching_checksum() {
        let done = asset("imgs/done.png", 1);
        let changed = asset("imgs/changed.png", 2);
        let failed = asset("imgs/failed.png", 3);
        let mut previous = manifest_for(&[done.clone(), changed.clone(), failed.clone()]);
        for (a, status) in [
            (&done, MigrationStatus::Success),
            (&changed, MigrationStatus::Success),
            (&failed, MigrationStatus::Failed),
        ] {
            update_record(&mut previous, with_status(a.clone(), status));
        }

        let changed_now = FileAsset {
            checksum: "ff".repeat(32),
            ..changed
        };
        let new_file = asset("imgs/new.png", 4);

        let remaining = resume_candidates(&previous, vec![done, changed_now, failed, new_file]);
        let keys: Vec<&str> = remaining.iter().map(|a| a.remote_key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["imgs/changed.png", "imgs/failed.png", "imgs/new.png"]
        );
    }
}
