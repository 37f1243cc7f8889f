//! Server configuration.
//!
//! Read from an optional TOML file with a `[server]` table, then overridden
//! by the `BIND_ADDR` / `PORT` environment variables:
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//! export_dir = "data/exports"
//! max_upload_bytes = 33554432
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ServerConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// When set, every export is also written into this directory.
    pub export_dir: Option<PathBuf>,
    /// Maximum accepted workbook upload size.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            export_dir: None,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
}

impl ServerConfig {
    /// Parses the `[server]` table of a TOML document. Missing keys keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is invalid.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        Ok(file.server)
    }

    /// Reads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Applies `BIND_ADDR` and `PORT` from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Applies `BIND_ADDR` and `PORT` looked up through `var`. An
    /// unparseable port is ignored.
    #[must_use]
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(bind_addr) = var("BIND_ADDR") {
            self.bind_addr = bind_addr;
        }
        if let Some(port) = var("PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => log::warn!("Ignoring invalid PORT {port:?}"),
            }
        }
        self
    }
}
