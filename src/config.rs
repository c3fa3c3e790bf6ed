//! Configuration module for Lockbox.

use serde::Deserialize;
use std::path::Path;

use crate::{LockboxError, Result};

/// Longest storage lifetime accepted for uploads (100 years).
pub const MAX_STORAGE_AGE_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Longest session cookie lifetime; browsers cap Max-Age at 400 days.
pub const MAX_COOKIE_AGE_DAYS: i64 = 400;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL that shareable links are built on (ends with `/`).
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080/".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// How long a query waits for a connection before the store counts as unavailable.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Interval between store health probes.
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
}

fn default_db_path() -> String {
    "data/lockbox.db".to_string()
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_health_interval() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            acquire_timeout_secs: default_acquire_timeout(),
            health_check_interval_secs: default_health_interval(),
        }
    }
}

/// Uploaded file storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded bytes are written to.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Lifetime of uploaded content in seconds (unset = kept forever).
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

fn default_storage_path() -> String {
    "storage".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_age_secs: None,
        }
    }
}

/// Upload limits, applied per upload request.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of files in one upload.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Maximum total bytes in one upload.
    #[serde(default = "default_size_limit")]
    pub size_limit_bytes: u64,
}

fn default_max_files() -> usize {
    10
}

fn default_size_limit() -> u64 {
    100 * 1024 * 1024 // 100MB
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            size_limit_bytes: default_size_limit(),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Time cost (iterations).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Parallelism (lanes).
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19456 // 19 MiB
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie max-age in days.
    #[serde(default = "default_cookie_max_age")]
    pub cookie_max_age_days: i64,
    /// Whether to set the `Secure` attribute on the session cookie.
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_cookie_max_age() -> i64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_max_age_days: default_cookie_max_age(),
            secure_cookie: false,
        }
    }
}

/// Web layer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Password submissions per minute per client IP.
    #[serde(default = "default_password_rate_limit")]
    pub password_rate_limit: u32,
    /// Uploads per minute per client IP.
    #[serde(default = "default_upload_rate_limit")]
    pub upload_rate_limit: u32,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP` (behind a reverse proxy).
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

fn default_password_rate_limit() -> u32 {
    10
}

fn default_upload_rate_limit() -> u32 {
    30
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec![],
            password_rate_limit: default_password_rate_limit(),
            upload_rate_limit: default_upload_rate_limit(),
            trust_proxy_headers: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/lockbox.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Password hashing parameters.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Web layer configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(LockboxError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(s)
            .map_err(|e| LockboxError::Validation(format!("config parse error: {e}")))?;
        config.normalize();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LOCKBOX_PUBLIC_URL`: base URL for shareable links
    /// - `LOCKBOX_DATABASE_PATH`: SQLite database file
    /// - `LOCKBOX_STORAGE_PATH`: upload storage directory
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 3] = [
            ("LOCKBOX_PUBLIC_URL", &mut self.server.public_url),
            ("LOCKBOX_DATABASE_PATH", &mut self.database.path),
            ("LOCKBOX_STORAGE_PATH", &mut self.storage.path),
        ];
        for (var, target) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }
        self.normalize();
    }

    /// Ensure the public URL ends with a slash so `public_url + id` is a valid link.
    fn normalize(&mut self) {
        if !self.server.public_url.ends_with('/') {
            self.server.public_url.push('/');
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_files == 0 {
            return Err(LockboxError::Validation(
                "limits.max_files must be at least 1".to_string(),
            ));
        }
        if self.limits.size_limit_bytes == 0 {
            return Err(LockboxError::Validation(
                "limits.size_limit_bytes must be at least 1".to_string(),
            ));
        }
        if self.web.password_rate_limit == 0 || self.web.upload_rate_limit == 0 {
            return Err(LockboxError::Validation(
                "web rate limits must be at least 1 request per minute".to_string(),
            ));
        }
        if let Some(secs) = self.storage.max_age_secs {
            if !(1..=MAX_STORAGE_AGE_SECS).contains(&secs) {
                return Err(LockboxError::Validation(format!(
                    "storage.max_age_secs must be between 1 and {MAX_STORAGE_AGE_SECS}, got {secs}"
                )));
            }
        }
        let days = self.session.cookie_max_age_days;
        if !(1..=MAX_COOKIE_AGE_DAYS).contains(&days) {
            return Err(LockboxError::Validation(format!(
                "session.cookie_max_age_days must be between 1 and {MAX_COOKIE_AGE_DAYS}, got {days}"
            )));
        }
        let url = &self.server.public_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LockboxError::Validation(format!(
                "server.public_url must be an http(s) URL, got {url:?}"
            )));
        }
        Ok(())
    }
}
