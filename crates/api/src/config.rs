//! Environment configuration
//!
//! The process reads its configuration once at boot:
//!
//! - `DATA_DIR`: data root (default `./data`)
//! - `API_KEY`: shared key every request must present
//! - `ALLOWED_ORIGIN`: comma-separated origins, `*.` wildcards allowed
//! - `APP_URL`: public base URL, used in reset-code delivery text
//! - `BODY_SIZE_LIMIT`: request body cap in bytes (default 6 MB)

use matchday_core::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Default request body cap
pub const DEFAULT_BODY_SIZE_LIMIT: usize = 6 * 1024 * 1024;

/// Boot-time configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Data root; every league lives under it
    pub data_dir: PathBuf,
    /// Shared api key, compared constant-time
    pub api_key: String,
    /// Allowed origins; entries may start with `*.`
    pub allowed_origins: Vec<String>,
    /// Public base URL of the app
    pub app_url: Option<String>,
    /// Request body cap in bytes
    pub body_size_limit: usize,
}

impl AppConfig {
    /// Minimal configuration for embedding and tests
    pub fn new(data_dir: impl Into<PathBuf>, api_key: impl Into<String>) -> Self {
        AppConfig {
            data_dir: data_dir.into(),
            api_key: api_key.into(),
            allowed_origins: Vec::new(),
            app_url: None,
            body_size_limit: DEFAULT_BODY_SIZE_LIMIT,
        }
    }

    /// Read configuration from the environment
    pub fn from_env() -> Result<Self> {
        let api_key =
            env::var("API_KEY").map_err(|_| Error::validation("API_KEY is not set"))?;
        if api_key.trim().is_empty() {
            return Err(Error::validation("API_KEY is empty"));
        }
        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        let allowed_origins = env::var("ALLOWED_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let body_size_limit = match env::var("BODY_SIZE_LIMIT") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::validation(format!("BODY_SIZE_LIMIT {raw:?} is not a number")))?,
            Err(_) => DEFAULT_BODY_SIZE_LIMIT,
        };
        Ok(AppConfig {
            data_dir: PathBuf::from(data_dir),
            api_key,
            allowed_origins,
            app_url: env::var("APP_URL").ok(),
            body_size_limit,
        })
    }
}
