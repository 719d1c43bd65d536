pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod hasher;
pub mod manifest;
pub mod models;
pub mod progress;
pub mod scanner;
pub mod storage;
pub mod uploader;

pub use config::{MigrateSettings, MigrationConfig, R2Config};
pub use engine::{MigrationEngine, MigrationOutcome};
pub use error::Error;
pub use event_log::MigrationLogger;
pub use models::{
    FileAsset, MigrationManifest, MigrationRecord, MigrationStatus, MigrationSummary,
};
pub use progress::{ProgressRenderer, ProgressTracker, SilentRenderer};
pub use storage::{ObjectStore, R2Store};
