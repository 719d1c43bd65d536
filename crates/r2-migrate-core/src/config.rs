use crate::error::Error;
use chrono::{DateTime, Utc};
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use tracing::warn;

pub const MAX_CONCURRENCY: usize = 50;
pub const MAX_RETRIES: u32 = 10;

/// Run settings layered from defaults, an optional `Migrate.toml` and
/// `MIGRATE_*` environment variables. CLI flags are applied on top.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrateSettings {
    pub source_paths: Vec<String>,
    pub public_dir: String,
    pub ignore_patterns: Vec<String>,
    pub concurrency: usize,
    pub max_retries: u32,
    pub batch_size: Option<usize>,
    pub skip_existing: bool,
    pub dry_run: bool,
    pub manifest_path: String,
    pub log_path: String,
}

impl MigrateSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(Error::InvalidSetting(format!(
                "concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(Error::InvalidSetting(format!(
                "max_retries must be between 0 and {}, got {}",
                MAX_RETRIES, self.max_retries
            )));
        }
        if self.batch_size == Some(0) {
            return Err(Error::InvalidSetting("batch_size must be a positive integer".to_string()));
        }
        if self.source_paths.is_empty() {
            return Err(Error::InvalidSetting("at least one source path is required".to_string()));
        }
        Ok(())
    }
}

fn settings_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("source_paths", vec!["public/imgs", "public/videos"])?
        .set_default("public_dir", "public")?
        .set_default("ignore_patterns", Vec::<String>::new())?
        .set_default("concurrency", 10_i64)?
        .set_default("max_retries", 3_i64)?
        .set_default("skip_existing", true)?
        .set_default("dry_run", false)?
        .set_default("manifest_path", "scripts/r2/.migration-manifest.json")?
        .set_default("log_path", "scripts/r2/.migration-log.jsonl")
}

fn environment_source() -> Environment {
    Environment::with_prefix("MIGRATE")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("source_paths")
        .with_list_parse_key("ignore_patterns")
}

pub fn load_settings() -> Result<MigrateSettings, ConfigError> {
    settings_builder()?
        .add_source(ConfigFile::with_name("Migrate").required(false))
        .add_source(environment_source())
        .build()?
        .try_deserialize::<MigrateSettings>()
}

pub fn load_settings_file(path: &Path) -> Result<MigrateSettings, ConfigError> {
    settings_builder()?
        .add_source(ConfigFile::from(path))
        .build()?
        .try_deserialize::<MigrateSettings>()
}

/// Credentials and bucket for the R2 account, read from the environment.
#[derive(Clone)]
pub struct R2Config {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub endpoint_override: Option<String>,
    pub public_url: Option<String>,
}

impl fmt::Debug for R2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Config")
            .field("account_id", &mask(&self.account_id))
            .field("access_key_id", &mask(&self.access_key_id))
            .field("secret_access_key", &"****************")
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_override", &self.endpoint_override)
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl R2Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Every missing required
    /// variable is reported in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let account_id = get("R2_ACCOUNT_ID").or_else(|| get("NEXT_PUBLIC_R2_ACCOUNT_ID"));
        let access_key_id = get("R2_ACCESS_KEY_ID");
        let secret_access_key = get("R2_SECRET_ACCESS_KEY");
        let bucket_name = get("R2_BUCKET_NAME");

        let mut missing = Vec::new();
        if account_id.is_none() {
            missing.push("R2_ACCOUNT_ID".to_string());
        }
        if access_key_id.is_none() {
            missing.push("R2_ACCESS_KEY_ID".to_string());
        }
        if secret_access_key.is_none() {
            missing.push("R2_SECRET_ACCESS_KEY".to_string());
        }
        if bucket_name.is_none() {
            missing.push("R2_BUCKET_NAME".to_string());
        }

        match (account_id, access_key_id, secret_access_key, bucket_name) {
            (Some(account), Some(key), Some(secret), Some(bucket)) => Ok(Self {
                account_id: account,
                access_key_id: key,
                secret_access_key: secret,
                bucket_name: bucket,
                endpoint_override: get("R2_ENDPOINT_OVERRIDE"),
                public_url: get("NEXT_PUBLIC_R2_CDN_URL"),
            }),
            _ => Err(Error::MissingEnv(missing)),
        }
    }

    pub fn endpoint(&self) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.r2.cloudflarestorage.com", self.account_id),
        }
    }

    /// Log and return warnings for values that look malformed. These are advisory;
    /// the real check is the connectivity check at startup.
    pub fn format_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !is_lower_hex(&self.account_id, 32) {
            warnings.push(unusual("account ID", "expected 32-char hex string"));
        }
        if !is_lower_hex(&self.access_key_id, 32) {
            warnings.push(unusual("access key ID", "expected 32-char hex string"));
        }
        if !is_lower_hex(&self.secret_access_key, 64) {
            warnings.push(unusual("secret access key", "expected 64-char hex string"));
        }
        if !is_valid_bucket_name(&self.bucket_name) {
            warnings.push(unusual(
                "bucket name",
                "3-63 chars, lowercase alphanumeric with hyphens",
            ));
        }
        for warning in &warnings {
            warn!("{}", warning);
        }
        warnings
    }

    pub fn masked_summary(&self) -> String {
        let mut out = format!(
            "Account ID: {}\nAccess Key: {}\nSecret Key: ****************\nBucket: {}",
            mask(&self.account_id),
            mask(&self.access_key_id),
            self.bucket_name
        );
        if let Some(endpoint) = &self.endpoint_override {
            out.push_str(&format!("\nEndpoint Override: {}", endpoint));
        }
        if let Some(url) = &self.public_url {
            out.push_str(&format!("\nCDN URL: {}", url));
        }
        out
    }
}

fn unusual(field: &str, expected: &str) -> String {
    format!("R2 {} format looks unusual ({})", field, expected)
}

fn mask(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{}...", prefix)
}

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < 3 || bytes.len() > 63 {
        return false;
    }
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    edge_ok(bytes[0])
        && edge_ok(bytes[bytes.len() - 1])
        && bytes.iter().all(|&b| edge_ok(b) || b == b'-')
}

/// Configuration captured into the manifest so a run can be reproduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    pub account_id: String,
    pub bucket_name: String,
    pub public_url: Option<String>,
    pub concurrency: usize,
    pub max_retries: u32,
    pub dry_run: bool,
    pub skip_existing: bool,
    pub batch_size: Option<usize>,
    pub created_at: DateTime<Utc>,
}

impl MigrationConfig {
    pub fn snapshot(r2: &R2Config, settings: &MigrateSettings) -> Self {
        Self {
            account_id: r2.account_id.clone(),
            bucket_name: r2.bucket_name.clone(),
            public_url: r2.public_url.clone(),
            concurrency: settings.concurrency,
            max_retries: settings.max_retries,
            dry_run: settings.dry_run,
            skip_existing: settings.skip_existing,
            batch_size: settings.batch_size,
            created_at: Utc::now(),
        }
    }
}

/// Public CDN link for an object key.
pub fn cdn_url(base: &str, key: &str) -> String {
    let key = key.replace('\\', "/");
    let key = key.trim_start_matches('/');
    let key = key.strip_prefix("public/").unwrap_or(key);
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
