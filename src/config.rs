use std::path::PathBuf;

use crate::error::AppError;
use crate::validation::Validator;

pub const ENV_DATA_DIR: &str = "HEADCOUNT_DATA_DIR";
pub const ENV_DB_FILE: &str = "HEADCOUNT_DB_FILE";
pub const ENV_POOL_SIZE: &str = "HEADCOUNT_POOL_SIZE";
pub const ENV_LOG: &str = "HEADCOUNT_LOG";

pub const DEFAULT_DB_FILE: &str = "headcount.db";
pub const DEFAULT_POOL_SIZE: u32 = 8;
const MAX_POOL_SIZE: u32 = 64;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Holds the database, `logs/` and `crash_logs/`.
    pub data_dir: PathBuf,
    pub db_file: String,
    pub pool_size: u32,
    /// `EnvFilter` directive; `RUST_LOG` and then the built-in default apply
    /// when unset.
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: DEFAULT_DB_FILE.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            log_filter: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("headcount"))
        .unwrap_or_else(|| PathBuf::from(".headcount"))
}

impl AppConfig {
    /// Load `.env` (if present) and then read the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Every invalid value is
    /// reported, not just the first.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();
        let mut v = Validator::new();

        if let Some(dir) = get(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(file) = get(ENV_DB_FILE) {
            if file.contains('/') || file.contains('\\') {
                v.fail(ENV_DB_FILE, "must be a file name, not a path");
            }
            config.db_file = file;
        }

        if let Some(raw) = get(ENV_POOL_SIZE) {
            match raw.parse::<u32>() {
                Ok(n) if (1..=MAX_POOL_SIZE).contains(&n) => config.pool_size = n,
                _ => v.fail(
                    ENV_POOL_SIZE,
                    format!("must be a number between 1 and {MAX_POOL_SIZE}"),
                ),
            }
        }

        config.log_filter = get(ENV_LOG);
        if let Some(ref filter) = config.log_filter {
            if tracing_subscriber::EnvFilter::try_new(filter).is_err() {
                v.fail(ENV_LOG, "is not a valid log filter");
            }
        }

        v.finish()?;
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
