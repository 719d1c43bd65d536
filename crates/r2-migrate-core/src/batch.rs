//! Bounded-concurrency orchestration of many asset uploads.

use crate::event_log::MigrationLogger;
use crate::models::{FileAsset, MigrationRecord, MigrationStatus};
use crate::progress::ProgressTracker;
use crate::storage::ObjectStore;
use crate::uploader::{self, AttemptEvent, RetryPolicy, Sleeper};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const SKIP_REASON: &str = "File already exists in R2";

/// Everything a unit of upload work needs, shared by all units of a run.
#[derive(Clone)]
pub struct UploadContext {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub policy: RetryPolicy,
    pub dry_run: bool,
    pub skip_existing: bool,
    pub concurrency: usize,
    pub sleeper: Arc<dyn Sleeper>,
}

enum AttemptNote {
    Started(u32),
    Failed(u32, String),
}

/// Upload every asset with at most `ctx.concurrency` units in flight.
///
/// Units are admitted in the order given; records come back in completion
/// order. One unit failing never cancels the others.
pub async fn batch_upload(
    ctx: &UploadContext,
    assets: &[FileAsset],
    logger: &MigrationLogger,
    tracker: &ProgressTracker,
) -> Vec<MigrationRecord> {
    let limit = ctx.concurrency.max(1);
    debug!("Uploading {} assets, {} at a time", assets.len(), limit);

    stream::iter(assets)
        .map(|asset| upload_unit(ctx, asset, logger, tracker))
        .buffer_unordered(limit)
        .collect()
        .await
}

async fn upload_unit(
    ctx: &UploadContext,
    asset: &FileAsset,
    logger: &MigrationLogger,
    tracker: &ProgressTracker,
) -> MigrationRecord {
    match uploader::check_skip(ctx.store.as_ref(), &ctx.bucket, asset, ctx.skip_existing).await {
        Ok(Some(record)) => {
            logger.log_upload_skipped(&asset.remote_key, SKIP_REASON).await;
            tracker.update(&asset.remote_key, asset.size_bytes);
            return record;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(
                "Could not check {} in {}, uploading anyway: {}",
                asset.remote_key, ctx.bucket, e
            );
            logger
                .log_skip_check_failed(&asset.remote_key, &e.to_string())
                .await;
        }
    }

    // Attempt notifications are forwarded to the event log while the
    // upload is still running. The channel closes when the upload ends.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let upload = async move {
        let observer = move |event: AttemptEvent<'_>| {
            let note = match event {
                AttemptEvent::Started { attempt } => AttemptNote::Started(attempt),
                AttemptEvent::Failed { attempt, error } => {
                    AttemptNote::Failed(attempt, error.to_string())
                }
            };
            let _ = tx.send(note);
        };
        uploader::upload_with_retry(
            ctx.store.as_ref(),
            &ctx.bucket,
            asset,
            &ctx.policy,
            ctx.dry_run,
            ctx.sleeper.as_ref(),
            &observer,
        )
        .await
    };
    let forward = async {
        while let Some(note) = rx.recv().await {
            match note {
                AttemptNote::Started(attempt) => {
                    logger.log_upload_started(&asset.remote_key, attempt).await
                }
                AttemptNote::Failed(attempt, error) => {
                    logger
                        .log_upload_failed(&asset.remote_key, attempt, &error)
                        .await
                }
            }
        }
    };
    let (record, ()) = tokio::join!(upload, forward);

    match record.status {
        MigrationStatus::Success => {
            let duration_ms = match (record.upload_started_at, record.upload_completed_at) {
                (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
                _ => 0,
            };
            logger
                .log_upload_success(&asset.remote_key, asset.size_bytes, duration_ms)
                .await;
        }
        MigrationStatus::Failed => {
            let error = record.error_message.as_deref().unwrap_or("Unknown error");
            logger
                .log_upload_failed(&asset.remote_key, record.attempts, error)
                .await;
        }
        _ => {}
    }

    debug_assert!(record.status.is_terminal());
    tracker.update(&asset.remote_key, asset.size_bytes);
    record
}

/// Run `batch_upload` over sequential chunks of `batch_size` assets,
/// logging `batch_completed` after each chunk.
pub async fn batch_upload_chunked(
    ctx: &UploadContext,
    assets: &[FileAsset],
    logger: &MigrationLogger,
    tracker: &ProgressTracker,
    batch_size: usize,
) -> Vec<MigrationRecord> {
    let mut all_records = Vec::with_capacity(assets.len());

    for (index, chunk) in assets.chunks(batch_size.max(1)).enumerate() {
        let batch_number = index + 1;
        info!(
            "Processing batch {} ({} files)...",
            batch_number,
            chunk.len()
        );

        let records = batch_upload(ctx, chunk, logger, tracker).await;
        all_records.extend(records);

        logger.log_batch_completed(batch_number, chunk.len()).await;
    }

    all_records
}
