//! Error types for catalog and function management

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a [`KaffineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A URI, cache entry, function or version does not exist
    NotFound,
    /// Duplicate group names across catalogs, or an ambiguous match
    Conflict,
    /// The catalog could not be fetched
    Transport,
    /// A document or reference is malformed
    Parse,
    /// The catalog is already tracked
    AlreadyPresent,
    /// Local filesystem failure
    Io,
}

#[derive(Error, Debug)]
pub enum KaffineError {
    #[error("catalog '{uri}' is not tracked")]
    CatalogNotFound { uri: String },

    #[error("catalog '{uri}' is not cached (expected '{id}.yaml')")]
    CacheMiss { uri: String, id: String },

    #[error("no functions with name '{name}'")]
    FunctionNotFound { name: String },

    #[error("function '{name}' has no version '{version}'")]
    VersionNotFound { name: String, version: String },

    #[error("function '{name}' is not installed (check spelling?)")]
    NotInstalled { name: String },

    #[error("catalog '{uri}' contains conflicting function names: {}", names.join(", "))]
    NameConflict { uri: String, names: Vec<String> },

    #[error("more than one function found with search term '{query}': {}", matches.join(", "))]
    Ambiguous { query: String, matches: Vec<String> },

    #[error("failed to fetch '{uri}': {reason}")]
    Transport { uri: String, reason: String },

    #[error("failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("invalid function reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("invalid catalog: {reason}")]
    InvalidCatalog { reason: String },

    #[error("catalog '{uri}' is already present")]
    AlreadyPresent { uri: String },

    #[error("filesystem error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}")]
    Serialize {
        what: String,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

impl KaffineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KaffineError::CatalogNotFound { .. }
            | KaffineError::CacheMiss { .. }
            | KaffineError::FunctionNotFound { .. }
            | KaffineError::VersionNotFound { .. }
            | KaffineError::NotInstalled { .. } => ErrorKind::NotFound,
            KaffineError::NameConflict { .. } | KaffineError::Ambiguous { .. } => {
                ErrorKind::Conflict
            }
            KaffineError::Transport { .. } => ErrorKind::Transport,
            KaffineError::Parse { .. }
            | KaffineError::InvalidReference { .. }
            | KaffineError::InvalidCatalog { .. }
            | KaffineError::Serialize { .. } => ErrorKind::Parse,
            KaffineError::AlreadyPresent { .. } => ErrorKind::AlreadyPresent,
            KaffineError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KaffineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transport(uri: &str, reason: impl ToString) -> Self {
        KaffineError::Transport {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KaffineError>;
