use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required R2 configuration variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Failed to compute checksum for {}: {source}", .path.display())]
    Checksum {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Discovery failed for {}: {reason}", .path.display())]
    Discovery { path: PathBuf, reason: String },

    #[error(
        "R2 bucket '{0}' not found, create it in the Cloudflare dashboard first"
    )]
    BucketNotFound(String),

    #[error(
        "Access denied to R2 bucket '{0}', check the API token has read/write permission"
    )]
    AccessDenied(String),

    #[error("Failed to connect to object storage: {0}")]
    Connectivity(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Failed to write manifest {}: {source}", .path.display())]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors the operator fixes by editing configuration rather than retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::MissingEnv(_) | Error::InvalidSetting(_)
        )
    }
}
