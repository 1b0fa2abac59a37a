//! Configuration - JSON file with defaults for every field.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogSource;
use crate::content::{DEFAULT_GATEWAY, DEFAULT_UPLOAD_ENDPOINT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Prefix substituted for `ipfs://` when fetching content.
    pub gateway: String,
    /// Catalog location: an `ipfs://`/HTTP URI or a local path. Bundled
    /// catalog when unset.
    pub catalog_uri: Option<String>,
    pub upload_endpoint: String,
    pub upload_token: Option<String>,
    pub default_description: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: DEFAULT_GATEWAY.to_string(),
            catalog_uri: None,
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            upload_token: None,
            default_description: "A custom avatar".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn catalog_source(&self) -> CatalogSource {
        match self.catalog_uri.as_deref() {
            None => CatalogSource::Bundled,
            Some(uri) if uri.contains("://") => CatalogSource::Uri(uri.to_string()),
            Some(path) => CatalogSource::File(path.into()),
        }
    }
}
