mod commands;
mod logging;
mod progress;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, MigrateArgs, OutputFormat};
use indicatif::{HumanBytes, HumanDuration};
use progress::CliProgress;
use r2_migrate_core::config::{self, cdn_url};
use r2_migrate_core::manifest::failed_records;
use r2_migrate_core::{
    Error, MigrateSettings, MigrationEngine, MigrationManifest, MigrationOutcome, ObjectStore,
    ProgressRenderer, R2Config, R2Store, SilentRenderer,
};
use tracing::{error, info};

const EXIT_OK: i32 = 0;
const EXIT_PARTIAL_FAILURE: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_FATAL: i32 = 3;

const MAX_LISTED_FAILURES: usize = 10;

#[tokio::main]
async fn main() {
    // .env.local is loaded first so its values win; dotenv never overrides.
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    let args = Cli::parse();
    let json_output = matches!(
        &args.command,
        Some(Commands::Migrate(MigrateArgs {
            format: OutputFormat::Json,
            ..
        }))
    );

    let code = {
        let _guard = logging::init_logger(json_output);
        match args.command {
            Some(Commands::Migrate(migrate_args)) => run_migrate(&migrate_args).await,
            Some(Commands::Check) => run_check().await,
            Some(Commands::PrintConfig) => run_print_config(),
            None => {
                let _ = Cli::command().print_long_help();
                EXIT_OK
            }
        }
    };

    process::exit(code);
}

fn exit_code_for(err: &Error) -> i32 {
    if err.is_configuration() {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_FATAL
    }
}

fn load_settings() -> Result<MigrateSettings, Error> {
    Ok(config::load_settings()?)
}

fn load_r2_config() -> Result<R2Config, Error> {
    let r2 = R2Config::from_env()?;
    r2.format_warnings();
    Ok(r2)
}

async fn run_migrate(args: &MigrateArgs) -> i32 {
    let human = args.format == OutputFormat::Human;

    let (settings, r2) = match prepare(args) {
        Ok(prepared) => prepared,
        Err(err) => {
            error!("Configuration error: {}", err);
            return exit_code_for(&err);
        }
    };

    if human {
        println!("{}", "R2 Configuration".bold());
        println!("{}", r2.masked_summary());
        if settings.dry_run {
            println!(
                "{}",
                "DRY RUN MODE - No files will be uploaded".yellow().bold()
            );
        }
        println!();
    }

    let store: Arc<dyn ObjectStore> = Arc::new(R2Store::new(&r2).await);
    let mut engine = MigrationEngine::new(settings, r2.clone(), store);
    if let Some(previous) = &args.resume {
        engine = engine.with_resume(previous);
    }

    let renderer: Box<dyn ProgressRenderer> = if human {
        Box::new(CliProgress::new())
    } else {
        Box::new(SilentRenderer)
    };

    let outcome = match engine.run(renderer).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if err.is_configuration() {
                error!("Configuration error: {}", err);
            } else {
                error!("Fatal error: {}", err);
            }
            return exit_code_for(&err);
        }
    };

    if human {
        display_outcome(&outcome, &r2);
    } else if let Err(err) = print_json(&outcome.manifest) {
        error!("Failed to write manifest JSON: {:#}", err);
        return EXIT_FATAL;
    }

    if outcome.has_failures() {
        EXIT_PARTIAL_FAILURE
    } else {
        EXIT_OK
    }
}

fn prepare(args: &MigrateArgs) -> Result<(MigrateSettings, R2Config), Error> {
    let mut settings = load_settings()?;
    args.apply(&mut settings);
    settings.validate()?;
    let r2 = load_r2_config()?;
    Ok((settings, r2))
}

fn print_json(manifest: &MigrationManifest) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(manifest).context("serializing manifest")?;
    println!("{}", json);
    Ok(())
}

fn display_outcome(outcome: &MigrationOutcome, r2: &R2Config) {
    let manifest = &outcome.manifest;
    let summary = &manifest.summary;

    println!();
    println!("{}", "Migration Summary".bold());
    println!("  Total files          {:>8}", summary.total_files);
    println!(
        "  Uploaded             {:>8}",
        summary.success_count.to_string().green()
    );
    println!(
        "  Skipped (existing)   {:>8}",
        summary.skipped_count.to_string().cyan()
    );
    println!(
        "  Failed               {:>8}",
        if summary.failed_count > 0 {
            summary.failed_count.to_string().red()
        } else {
            summary.failed_count.to_string().normal()
        }
    );
    println!(
        "  Data uploaded        {:>8}",
        HumanBytes(summary.total_bytes_uploaded).to_string()
    );
    println!(
        "  Duration             {:>8}",
        HumanDuration(Duration::from_millis(summary.duration_ms)).to_string()
    );
    println!(
        "  Average speed        {:>8}/s",
        HumanBytes(summary.average_speed_bytes_per_sec as u64).to_string()
    );
    println!();

    info!("Manifest saved: {}", outcome.manifest_path.display());
    info!("Log saved: {}", outcome.log_path.display());

    let failed = failed_records(manifest);
    if failed.is_empty() {
        println!("{}", "All files migrated successfully!".green().bold());
    } else {
        println!(
            "{}",
            format!("{} file(s) failed to upload:", failed.len()).yellow()
        );
        for record in failed.iter().take(MAX_LISTED_FAILURES) {
            println!(
                "  - {}: {}",
                record.id,
                record.error_message.as_deref().unwrap_or("Unknown error")
            );
        }
        if failed.len() > MAX_LISTED_FAILURES {
            println!(
                "  ... and {} more (see {})",
                failed.len() - MAX_LISTED_FAILURES,
                outcome.log_path.display()
            );
        }
    }

    if let (Some(base), Some(record)) = (
        r2.public_url.as_deref(),
        r2_migrate_core::manifest::successful_records(manifest).first(),
    ) {
        println!();
        let url = cdn_url(base, &record.id);
        println!("Example URL: {}", url.as_str().underline());
    }
}

async fn run_check() -> i32 {
    let r2 = match load_r2_config() {
        Ok(r2) => r2,
        Err(err) => {
            error!("Configuration error: {}", err);
            return exit_code_for(&err);
        }
    };
    println!("{}", r2.masked_summary());

    let store = R2Store::new(&r2).await;
    match store.probe_connectivity(&r2.bucket_name).await {
        Ok(()) => {
            println!(
                "{} Connected to bucket {}",
                "✓".green(),
                r2.bucket_name.bold()
            );
            EXIT_OK
        }
        Err(err) => {
            println!("{} {}", "✗".red(), err);
            exit_code_for(&err)
        }
    }
}

fn run_print_config() -> i32 {
    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return exit_code_for(&err);
        }
    };
    println!("Configuration: {:#?}", settings);

    match load_r2_config() {
        Ok(r2) => {
            println!("{}", r2.masked_summary());
            EXIT_OK
        }
        Err(err) => {
            println!("{} {}", "R2:".bold(), err.to_string().red());
            exit_code_for(&err)
        }
    }
}
