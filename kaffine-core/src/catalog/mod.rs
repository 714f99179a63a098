//! Kaffine catalogs - function discovery and caching
//!
//! This module provides functionality for loading function catalogs from
//! local or remote URIs, caching them on disk, and searching the functions
//! they define.
//!
//! # Overview
//!
//! - Catalogs are fetched once and cached under `catalogs/<digest>.yaml`
//! - The configured URI list is reconciled against the cache directory
//! - Every function is indexed by its `group/kind` name, which must be
//!   unique across all loaded catalogs
//!
//! # Architecture
//!
//! ```text
//! config.yaml (catalogs: [uri, ...])
//!     │
//!     ▼
//! CatalogManager::sync ──► Fetcher (file:// or http(s)://)
//!     │                        │
//!     ▼                        ▼
//! CatalogCache ◄────── catalogs/<sha256(uri)>.yaml
//!     │
//!     ▼
//! function index (group/kind → FunctionDefinition)
//! ```

mod cache;
mod fetch;
mod manager;
mod merge;
mod model;
mod reference;

pub use cache::{digest, CatalogCache};
pub use fetch::{Fetcher, TransportFetcher};
pub use manager::{CatalogManager, CatalogUpdate, DroppedUri, SyncReport};
pub use merge::merge_diff;
pub use model::{
    CatalogMetadata, CatalogSpec, ContainerRuntime, ExecRuntime, FunctionCatalog,
    FunctionDefinition, FunctionNames, FunctionVersion, Platform, Runtime, CATALOG_API_VERSION,
    CATALOG_KIND,
};
pub use reference::FunctionRef;

#[cfg(test)]
pub(crate) mod tests;
