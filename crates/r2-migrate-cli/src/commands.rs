use clap::{Args, Parser, Subcommand, ValueEnum};
use r2_migrate_core::MigrateSettings;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "r2-migrate")]
#[command(about = "Migrate public images and videos to Cloudflare R2", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover local assets and upload them to the configured bucket
    Migrate(MigrateArgs),
    /// Validate configuration and test bucket connectivity
    Check,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Source directory to migrate (repeatable)
    #[arg(long = "source", value_name = "DIR")]
    pub sources: Vec<String>,

    /// Directory object keys are made relative to
    #[arg(long, value_name = "DIR")]
    pub public_dir: Option<String>,

    /// Maximum parallel uploads
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub concurrency: Option<u32>,

    /// Attempts per file before it is marked failed
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: Option<u32>,

    /// Walk and hash everything but upload nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip files that already exist in the bucket
    #[arg(long, overrides_with = "no_skip_existing")]
    pub skip_existing: bool,

    /// Force re-upload of every file
    #[arg(long, overrides_with = "skip_existing")]
    pub no_skip_existing: bool,

    /// Upload in sequential batches of this many files
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Where to write the migration manifest
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<String>,

    /// Where to append the JSON-Lines event log
    #[arg(long, value_name = "PATH")]
    pub log: Option<String>,

    /// Previous manifest; files it records as migrated are not re-uploaded
    #[arg(long, value_name = "MANIFEST")]
    pub resume: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

impl MigrateArgs {
    /// Flags win over file and environment settings.
    pub fn apply(&self, settings: &mut MigrateSettings) {
        if !self.sources.is_empty() {
            settings.source_paths = self.sources.clone();
        }
        if let Some(public_dir) = &self.public_dir {
            settings.public_dir = public_dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency as usize;
        }
        if let Some(max_retries) = self.max_retries {
            settings.max_retries = max_retries;
        }
        if self.dry_run {
            settings.dry_run = true;
        }
        if self.skip_existing {
            settings.skip_existing = true;
        }
        if self.no_skip_existing {
            settings.skip_existing = false;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = Some(batch_size as usize);
        }
        if let Some(manifest) = &self.manifest {
            settings.manifest_path = manifest.clone();
        }
        if let Some(log) = &self.log {
            settings.log_path = log.clone();
        }
    }
}
