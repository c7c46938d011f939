//! Service configuration
//!
//! Loaded from an optional JSON file. Every field has a default, so an empty
//! object is a valid configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geonames::config::{DEFAULT_DATABASE_FILE, DEFAULT_DATA_DIR};
use crate::geonames::GeoNamesConfig;
use crate::http_server::{HttpServerConfig, InitMode};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the dataset lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory relative paths are resolved against (default: ".")
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Data directory (default: "geonames_data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file name inside the data directory (default: "geonames.db")
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_database_file() -> String {
    DEFAULT_DATABASE_FILE.to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            data_dir: default_data_dir(),
            database_file: default_database_file(),
        }
    }
}

impl DataConfig {
    /// Resolve paths, creating the data directory if absent
    pub fn resolve(&self) -> Result<GeoNamesConfig, ConfigError> {
        GeoNamesConfig::resolve(&self.base_dir, &self.data_dir, &self.database_file).map_err(
            |source| ConfigError::DataDir {
                path: self.base_dir.join(&self.data_dir),
                source,
            },
        )
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub data: DataConfig,

    /// When the database handle is created (default: eager)
    #[serde(default)]
    pub init_mode: InitMode,
}

impl ServiceConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: ServiceConfig = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.host.trim().is_empty() {
            return Err(ConfigError::Invalid("http.host must not be empty".to_string()));
        }

        if self.http.port == 0 {
            return Err(ConfigError::Invalid("http.port must be > 0".to_string()));
        }

        let name = self.data.database_file.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "data.database_file must be a plain file name, got '{}'",
                self.data.database_file
            )));
        }

        if self.data.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data.data_dir must not be empty".to_string()));
        }

        Ok(())
    }
}
