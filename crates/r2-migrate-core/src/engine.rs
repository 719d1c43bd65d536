use crate::batch::{self, UploadContext};
use crate::config::{self, MigrateSettings, MigrationConfig, R2Config};
use crate::error::Error;
use crate::event_log::MigrationLogger;
use crate::manifest;
use crate::models::{FileAsset, MigrationManifest};
use crate::progress::{ProgressRenderer, ProgressTracker};
use crate::scanner;
use crate::storage::ObjectStore;
use crate::uploader::{RetryPolicy, Sleeper, TokioSleeper};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct MigrationEngine {
    settings: MigrateSettings,
    r2_config: R2Config,
    store: Arc<dyn ObjectStore>,
    sleeper: Arc<dyn Sleeper>,
    resume_from: Option<PathBuf>,
}

#[derive(Debug)]
pub struct MigrationOutcome {
    pub manifest: MigrationManifest,
    pub manifest_path: PathBuf,
    pub log_path: PathBuf,
}

impl MigrationOutcome {
    pub fn has_failures(&self) -> bool {
        self.manifest.summary.failed_count > 0
    }
}

impl MigrationEngine {
    pub fn new(
        settings: MigrateSettings,
        r2_config: R2Config,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            settings,
            r2_config,
            store,
            sleeper: Arc::new(TokioSleeper),
            resume_from: None,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Drop assets a previous manifest already records as migrated.
    pub fn with_resume(mut self, manifest_path: impl Into<PathBuf>) -> Self {
        self.resume_from = Some(manifest_path.into());
        self
    }

    /// Run the migration pipeline:
    /// 1. Check settings and bucket connectivity
    /// 2. Parallel discovery and hashing of local assets
    /// 3. Bounded-concurrency upload, recording every outcome
    /// 4. Write the manifest
    ///
    /// Any error that aborts the run is appended to the event log as
    /// `migration_error` before it is returned.
    pub async fn run(
        &self,
        renderer: Box<dyn ProgressRenderer>,
    ) -> Result<MigrationOutcome, Error> {
        let logger = MigrationLogger::new(&self.settings.log_path, Uuid::new_v4());

        match self.run_logged(&logger, renderer).await {
            Ok(outcome) => {
                logger.log_migration_completed(&outcome.manifest.summary).await;
                Ok(outcome)
            }
            Err(err) => {
                logger.log_migration_error(&err).await;
                Err(err)
            }
        }
    }

    async fn run_logged(
        &self,
        logger: &MigrationLogger,
        renderer: Box<dyn ProgressRenderer>,
    ) -> Result<MigrationOutcome, Error> {
        let started = Instant::now();
        self.settings.validate()?;

        let source_paths = config::non_overlapping_directories(self.settings.source_paths.clone());
        for source in &source_paths {
            if !Path::new(source).exists() {
                return Err(Error::InvalidSetting(format!(
                    "Source directory not found: {}",
                    source
                )));
            }
        }
        info!("Processing directories: {:?}", source_paths);

        if self.settings.dry_run {
            warn!("DRY RUN MODE - No files will be uploaded");
        }

        self.store.probe_connectivity(&self.r2_config.bucket_name).await?;
        info!("Connected to bucket {}", self.r2_config.bucket_name);

        info!("Discovering files...");
        let mut assets = self.discover(&source_paths).await?;
        let total_found = assets.len();

        if let Some(previous_path) = &self.resume_from {
            let previous = manifest::load_manifest(previous_path).await?;
            assets = manifest::resume_candidates(&previous, assets);
            info!(
                "Resuming from {}: {} of {} files still need uploading",
                previous_path.display(),
                assets.len(),
                total_found
            );
        }

        let total_bytes: u64 = assets.iter().map(|a| a.size_bytes).sum();
        info!("Found {} files ({} bytes total)", assets.len(), total_bytes);

        let migration_config = MigrationConfig::snapshot(&self.r2_config, &self.settings);
        let mut manifest = manifest::create_manifest(
            logger.migration_id(),
            migration_config,
            source_paths,
            &assets,
        );

        logger.log_migration_started(assets.len(), total_bytes).await;
        self.upload_all(&mut manifest, &assets, total_bytes, logger, renderer).await;
        manifest::finalize_manifest(&mut manifest, started);

        let manifest_path = PathBuf::from(&self.settings.manifest_path);
        manifest::save_manifest(&manifest, &manifest_path).await?;

        let summary = &manifest.summary;
        info!(
            "Migration {} finished: {} uploaded, {} skipped, {} failed",
            manifest.migration_id,
            summary.success_count,
            summary.skipped_count,
            summary.failed_count
        );

        Ok(MigrationOutcome {
            manifest,
            manifest_path,
            log_path: logger.path().to_path_buf(),
        })
    }

    async fn discover(&self, source_paths: &[String]) -> Result<Vec<FileAsset>, Error> {
        let roots: Vec<PathBuf> = source_paths.iter().map(PathBuf::from).collect();
        let public_dir = PathBuf::from(&self.settings.public_dir);
        let ignore_patterns = self.settings.ignore_patterns.clone();

        let discovery_start = Instant::now();
        let assets = tokio::task::spawn_blocking(move || {
            let globs: Vec<&str> = ignore_patterns.iter().map(|s| s.as_str()).collect();
            scanner::discover_assets(&roots, &public_dir, &globs)
        })
        .await
        .map_err(|e| Error::Other(format!("discovery task failed: {}", e)))??;

        debug!(
            "Discovery completed in {:.2}s, {} assets",
            discovery_start.elapsed().as_secs_f64(),
            assets.len()
        );
        Ok(assets)
    }

    async fn upload_all(
        &self,
        manifest: &mut MigrationManifest,
        assets: &[FileAsset],
        total_bytes: u64,
        logger: &MigrationLogger,
        renderer: Box<dyn ProgressRenderer>,
    ) {
        let ctx = UploadContext {
            store: Arc::clone(&self.store),
            bucket: self.r2_config.bucket_name.clone(),
            policy: RetryPolicy::with_max_attempts(self.settings.max_retries),
            dry_run: self.settings.dry_run,
            skip_existing: self.settings.skip_existing,
            concurrency: self.settings.concurrency,
            sleeper: Arc::clone(&self.sleeper),
        };
        let tracker = ProgressTracker::new(assets.len(), total_bytes, renderer);

        info!("Uploading files...");
        let records = match self.settings.batch_size {
            Some(size) => batch::batch_upload_chunked(&ctx, assets, logger, &tracker, size).await,
            None => batch::batch_upload(&ctx, assets, logger, &tracker).await,
        };
        tracker.complete();

        for record in records {
            manifest::update_record(manifest, record);
        }
    }
}
