//! Application settings loaded from config.toml
//!
//! Every section has defaults, so a missing file or a partial file is valid.
//! `HOST`, `PORT` and `UPLOAD_DIR` from the environment override the file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming an alternative settings file.
pub const CONFIG_PATH_ENV: &str = "FORMULARY_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener and request limits
    pub server: ServerSettings,
    /// Invoice file storage
    pub storage: StorageSettings,
    /// Fuzzy search defaults
    pub search: SearchSettings,
    /// Log output
    pub logging: LoggingSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Largest accepted request body, in megabytes
    pub max_body_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
            ],
            max_body_mb: 20,
        }
    }
}

impl ServerSettings {
    /// `host:port` string for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Body limit in bytes.
    #[must_use]
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_mb * 1024 * 1024
    }
}

/// Invoice file storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory for uploaded files
    pub upload_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

/// Defaults applied when fuzzy search parameters are omitted
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Minimum trigram similarity, exclusive
    pub similarity_threshold: f64,
    /// Maximum edit distance, inclusive
    pub max_distance: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            max_distance: 2,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Log settings
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Output format
    pub format: LogFormat,
}

impl Settings {
    /// Applies `HOST`, `PORT` and `UPLOAD_DIR` overrides read through `lookup`.
    ///
    /// # Errors
    /// Returns an error if `PORT` is not a valid port number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|e| Error::Config {
                message: format!("Invalid PORT '{port}': {e}"),
            })?;
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        Ok(())
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from `$FORMULARY_CONFIG` or ./config.toml, then applies
/// environment overrides. A missing file means defaults.
///
/// # Errors
/// Returns an error if the file exists but is invalid, or an override is invalid.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());

    let mut settings = if Path::new(&path).exists() {
        load_settings(&path)?
    } else {
        info!(path = %path, "Config file not found, using defaults");
        Settings::default()
    };

    settings.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(settings)
}
