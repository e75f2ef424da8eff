use std::env;
use std::time::Duration;

/// Maximum size of an uploaded `dataFile` (default: 50 MB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Configuration for the S3 disk
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub bucket: Option<String>,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

/// Process-wide configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared webhook secret. `None` disables the password gate.
    pub password: Option<String>,

    /// Disk the webhook writes to: "s3", "fs" or "memory" (default: "s3")
    pub drive_disk: String,

    pub s3: S3Config,

    /// Root directory of the "fs" disk (default: "./storage")
    pub fs_root: String,

    /// Maximum `dataFile` size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Upper bound on a single storage write, `None` when unbounded (default: 60s)
    pub storage_timeout: Option<Duration>,

    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            password: None,
            drive_disk: "s3".to_string(),
            s3: S3Config {
                region: "us-east-1".to_string(),
                ..S3Config::default()
            },
            fs_root: "./storage".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            storage_timeout: Some(Duration::from_secs(60)),
            host: "0.0.0.0".to_string(),
            port: 3333,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            password: secret(env::var("PASSWORD").ok()),

            drive_disk: non_empty(env::var("DRIVE_DISK").ok())
                .map(|v| v.to_lowercase())
                .unwrap_or(default.drive_disk),

            s3: S3Config {
                bucket: non_empty(env::var("S3_BUCKET").ok()),
                region: non_empty(env::var("AWS_REGION").ok()).unwrap_or(default.s3.region),
                endpoint: non_empty(env::var("S3_ENDPOINT").ok()),
                access_key_id: non_empty(env::var("AWS_ACCESS_KEY_ID").ok()),
                secret_access_key: non_empty(env::var("AWS_SECRET_ACCESS_KEY").ok()),
                force_path_style: env::var("S3_FORCE_PATH_STYLE")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(false),
            },

            fs_root: non_empty(env::var("DRIVE_FS_ROOT").ok()).unwrap_or(default.fs_root),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            storage_timeout: match env::var("STORAGE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => default.storage_timeout,
            },

            host: non_empty(env::var("HOST").ok()).unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }

    /// Config for tests and local runs: in-memory disk, no password
    pub fn development() -> Self {
        Self {
            drive_disk: "memory".to_string(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Only an unset or empty secret disables the gate. Whitespace is a valid secret.
fn secret(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
