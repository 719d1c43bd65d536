mod common;

use common::{r2_config, settings, write_file, FakeStore, RecordingSleeper};
use r2_migrate_core::event_log::{read_log, MigrationEvent};
use r2_migrate_core::manifest::{self, failed_records};
use r2_migrate_core::models::MigrationStatus;
use r2_migrate_core::{Error, MigrationEngine, SilentRenderer};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Ten assets under public/imgs and public/videos, plus files that are
/// never assets.
fn create_site(root: &Path) {
    let public = root.join("public");
    for i in 0..8 {
        write_file(
            &public.join(format!("imgs/photo-{i}.png")),
            format!("image {i}").as_bytes(),
        );
    }
    write_file(&public.join("videos/a.mp4"), b"video a");
    write_file(&public.join("videos/b.webm"), b"video b");
    write_file(&public.join("imgs/README.md"), b"docs");
}

fn engine(site: &Path, state: &Path, store: Arc<FakeStore>) -> MigrationEngine {
    let settings = settings(site, &["imgs", "videos"], state);
    MigrationEngine::new(settings, r2_config(), store)
        .with_sleeper(Arc::new(RecordingSleeper::default()))
}

#[tokio::test]
async fn test_full_migration_summary_matches_records() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    create_site(site.path());

    let store = Arc::new(FakeStore::new());
    store.insert("imgs/photo-0.png");
    store.fail_always("imgs/photo-1.png");
    store.fail_always("videos/b.webm");
    store.fail_times("imgs/photo-2.png", 1);

    let outcome = engine(site.path(), state.path(), store.clone())
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();

    let summary = &outcome.manifest.summary;
    assert_eq!(summary.total_files, 10);
    assert_eq!(summary.success_count, 7);
    assert_eq!(summary.failed_count, 2);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(
        summary.success_count + summary.failed_count + summary.skipped_count,
        summary.total_files
    );
    assert!(outcome.has_failures());
    assert!(outcome.manifest.completed_at.is_some());
    assert_eq!(outcome.manifest.target_bucket, "media-test");

    let uploaded: u64 = outcome
        .manifest
        .records
        .values()
        .filter(|r| r.status == MigrationStatus::Success)
        .map(|r| r.asset.size_bytes)
        .sum();
    assert_eq!(summary.total_bytes_uploaded, uploaded);

    let failed: Vec<&str> = failed_records(&outcome.manifest)
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(failed, vec!["imgs/photo-1.png", "videos/b.webm"]);

    let saved = manifest::load_manifest(&outcome.manifest_path).await.unwrap();
    assert_eq!(saved.migration_id, outcome.manifest.migration_id);
    assert_eq!(saved.summary.failed_count, 2);

    let entries = read_log(&outcome.log_path).await.unwrap();
    let id = saved.migration_id;
    assert!(entries.iter().all(|e| e.migration_id == id));
    match &entries[0].event {
        MigrationEvent::MigrationStarted { files_count, .. } => assert_eq!(*files_count, 10),
        other => panic!("unexpected first event: {:?}", other),
    }
    match &entries.last().unwrap().event {
        MigrationEvent::MigrationCompleted { summary } => assert_eq!(summary.failed_count, 2),
        other => panic!("unexpected last event: {:?}", other),
    }
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    create_site(site.path());
    let store = Arc::new(FakeStore::new());

    let first = engine(site.path(), state.path(), store.clone())
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();
    assert_eq!(first.manifest.summary.success_count, 10);
    assert_eq!(store.puts(), 10);

    let second = engine(site.path(), state.path(), store.clone())
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();
    assert_eq!(second.manifest.summary.skipped_count, 10);
    assert_eq!(second.manifest.summary.success_count, 0);
    assert_eq!(store.puts(), 10);
    assert_ne!(first.manifest.migration_id, second.manifest.migration_id);
}

#[tokio::test]
async fn test_resume_only_retries_unfinished_assets() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    create_site(site.path());

    let store = Arc::new(FakeStore::new());
    store.fail_always("imgs/photo-3.png");
    let first = engine(site.path(), state.path(), store.clone())
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();
    assert_eq!(first.manifest.summary.failed_count, 1);

    // Keep the first manifest; the second run writes its own.
    let previous = state.path().join("previous.json");
    std::fs::copy(&first.manifest_path, &previous).unwrap();
    store.fail_times("imgs/photo-3.png", 0);
    write_file(&site.path().join("public/imgs/photo-4.png"), b"edited");

    let puts_before = store.puts();
    let second = engine(site.path(), state.path(), store.clone())
        .with_resume(&previous)
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();

    let keys: Vec<&str> = second.manifest.records.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["imgs/photo-3.png", "imgs/photo-4.png"]);
    // photo-4 already exists remotely, so only photo-3 is uploaded.
    assert_eq!(store.puts() - puts_before, 1);
    assert_eq!(second.manifest.summary.success_count, 1);
    assert_eq!(second.manifest.summary.skipped_count, 1);
}

#[tokio::test]
async fn test_chunked_run_records_every_asset() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    create_site(site.path());

    let mut config = settings(site.path(), &["imgs", "videos"], state.path());
    config.batch_size = Some(3);
    let outcome = MigrationEngine::new(config, r2_config(), Arc::new(FakeStore::new()))
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();

    assert_eq!(outcome.manifest.summary.success_count, 10);
    let batches = read_log(&outcome.log_path)
        .await
        .unwrap()
        .iter()
        .filter(|e| matches!(e.event, MigrationEvent::BatchCompleted { .. }))
        .count();
    assert_eq!(batches, 4);
}

#[tokio::test]
async fn test_empty_sources_still_write_manifest() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    std::fs::create_dir_all(site.path().join("public/imgs")).unwrap();
    std::fs::create_dir_all(site.path().join("public/videos")).unwrap();

    let outcome = engine(site.path(), state.path(), Arc::new(FakeStore::new()))
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();

    assert_eq!(outcome.manifest.summary.total_files, 0);
    assert!(!outcome.has_failures());
    assert!(outcome.manifest_path.exists());
}

#[tokio::test]
async fn test_missing_source_is_a_configuration_error() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    std::fs::create_dir_all(site.path().join("public/imgs")).unwrap();

    let err = engine(site.path(), state.path(), Arc::new(FakeStore::new()))
        .run(Box::new(SilentRenderer))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    let entries = read_log(&state.path().join("log.jsonl")).await.unwrap();
    assert!(matches!(
        entries.last().map(|e| &e.event),
        Some(MigrationEvent::MigrationError { .. })
    ));
    assert!(!state.path().join("manifest.json").exists());
}

#[tokio::test]
async fn test_unreachable_bucket_aborts_before_upload() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    create_site(site.path());
    let store = Arc::new(FakeStore::without_bucket());

    let err = engine(site.path(), state.path(), store.clone())
        .run(Box::new(SilentRenderer))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BucketNotFound(ref b) if b == "media-test"));
    assert!(!err.is_configuration());
    assert_eq!(store.puts(), 0);
}

#[tokio::test]
async fn test_dry_run_uploads_nothing() {
    let site = tempdir().unwrap();
    let state = tempdir().unwrap();
    create_site(site.path());

    let mut config = settings(site.path(), &["imgs", "videos"], state.path());
    config.dry_run = true;
    let store = Arc::new(FakeStore::new());
    let outcome = MigrationEngine::new(config, r2_config(), store.clone())
        .run(Box::new(SilentRenderer))
        .await
        .unwrap();

    assert_eq!(store.puts(), 0);
    assert_eq!(outcome.manifest.summary.success_count, 10);
    assert!(outcome.manifest.config.dry_run);
}
