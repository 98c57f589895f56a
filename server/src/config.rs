//! Configuration management for the server.

use cellbox_engine::{Catalog, Limits};
use std::env;
use std::path::{Path, PathBuf};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// JSON file holding the schema catalog
    pub catalog_path: PathBuf,
    /// Optional JSON file overriding engine limits
    pub limits_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let catalog_path = env::var("CATALOG_PATH")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingCatalogPath)?;

        let limits_path = env::var("LIMITS_PATH").ok().map(PathBuf::from);

        Ok(Self {
            host,
            port,
            catalog_path,
            limits_path,
        })
    }

    /// Engine limits, defaulted when no limits file is configured.
    pub fn load_limits(&self) -> Result<Limits, ConfigError> {
        match &self.limits_path {
            None => Ok(Limits::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// Read a catalog document.
///
/// An unreadable file is a backend fault; a file that does not describe a
/// catalog is a schema error.
pub fn read_catalog(path: &Path) -> cellbox_engine::error::Result<Catalog> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        cellbox_engine::Error::Backend(format!("reading {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        cellbox_engine::Error::InvalidCatalog(format!("{}: {}", path.display(), e))
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CATALOG_PATH environment variable is required")]
    MissingCatalogPath,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
