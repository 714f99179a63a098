//! Kaffine configuration file (.kaffine/config.yaml)
//!
//! Lists the catalogs to track and the functions to keep installed.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{KaffineError, Result};

/// The configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Catalog URIs; treated as a set
    #[serde(default)]
    pub catalogs: Vec<String>,

    /// Functions to install
    #[serde(default)]
    pub dependencies: Dependencies,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    /// `group/name` or `group/name@version` references
    #[serde(default)]
    pub krm_functions: Vec<String>,
}

impl Config {
    /// Load the config file, or return the default if it does not exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| KaffineError::io(path, e))?;

        let mut config: Config =
            serde_yaml_ng::from_str(&content).map_err(|e| KaffineError::Parse {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.normalize();
        Ok(config)
    }

    /// Write the config file, creating its directory if needed
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KaffineError::io(parent, e))?;
        }

        let mut config = self.clone();
        config.normalize();

        let content = serde_yaml_ng::to_string(&config).map_err(|source| KaffineError::Serialize {
            what: "config".to_string(),
            source,
        })?;

        std::fs::write(path, content).map_err(|e| KaffineError::io(path, e))?;
        Ok(())
    }

    /// Sort and de-duplicate the catalog list
    pub fn normalize(&mut self) {
        self.catalogs.sort();
        self.catalogs.dedup();
    }
}
