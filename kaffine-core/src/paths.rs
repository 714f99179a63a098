//! Locations inside the Kaffine state directory

use std::path::{Path, PathBuf};

use crate::error::{KaffineError, Result};

/// Name of the state directory
pub const KAFFINE_DIR: &str = ".kaffine";

/// Environment variable overriding the state directory
pub const KAFFINE_DIR_ENV: &str = "KAFFINE_DIR";

/// On-disk layout of a Kaffine state directory
///
/// ```text
/// .kaffine/
/// ├── config.yaml
/// ├── installed.yaml
/// ├── catalogs/<digest>.yaml
/// └── functions/<group>/<kind>.yaml
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KaffinePaths {
    root: PathBuf,
}

impl KaffinePaths {
    /// Use an explicit state directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the nearest `.kaffine` directory at or above `start`
    ///
    /// Falls back to `start/.kaffine` when no ancestor has one.
    pub fn discover(start: &Path) -> Self {
        let found = start
            .ancestors()
            .map(|dir| dir.join(KAFFINE_DIR))
            .find(|candidate| candidate.is_dir());

        match found {
            Some(root) => {
                tracing::debug!("Found state directory at {}", root.display());
                Self::new(root)
            }
            None => Self::new(start.join(KAFFINE_DIR)),
        }
    }

    /// Resolve the state directory: explicit path, then `KAFFINE_DIR`,
    /// then discovery from the current directory
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }

        if let Some(root) = std::env::var_os(KAFFINE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(root));
        }

        let cwd = std::env::current_dir().map_err(|e| KaffineError::io(".", e))?;
        Ok(Self::discover(&cwd))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn installed_file(&self) -> PathBuf {
        self.root.join("installed.yaml")
    }

    pub fn catalogs_dir(&self) -> PathBuf {
        self.root.join("catalogs")
    }

    pub fn functions_dir(&self) -> PathBuf {
        self.root.join("functions")
    }

    /// `functions/<group>/<kind>.yaml`
    pub fn function_file(&self, group: &str, kind: &str) -> PathBuf {
        self.functions_dir().join(group).join(format!("{kind}.yaml"))
    }

    /// Create the root directory
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| KaffineError::io(&self.root, e))
    }
}
