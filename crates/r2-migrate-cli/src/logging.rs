use std::env;
use std::io;
use tracing::debug;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install console and file logging. With `console_to_stderr` the console
/// layer leaves stdout free for machine-readable output.
pub fn init_logger(console_to_stderr: bool) -> impl Drop {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| "./logs/r2-migrate.log".to_string());

    let file_appender = tracing_appender::rolling::never("./", log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_writer = if console_to_stderr {
        BoxMakeWriter::new(io::stderr)
    } else {
        BoxMakeWriter::new(io::stdout)
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(console_writer)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(!console_to_stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    debug!("Tracing is configured for console and file logging.");

    guard
}
