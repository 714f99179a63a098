//! Catalog manager
//!
//! Tracks the loaded catalogs (keyed by the URI they came from) and a
//! flattened index of every function they define, keyed by group name.
//! Group names must be unique across all loaded catalogs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::cache::{digest, CatalogCache};
use super::fetch::{Fetcher, TransportFetcher};
use super::merge::merge_diff;
use super::model::{FunctionCatalog, FunctionDefinition};
use super::reference::FunctionRef;
use crate::error::{ErrorKind, KaffineError, Result};

/// A URI that was given up on, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedUri {
    pub uri: String,
    pub reason: String,
}

/// Result of reconciling desired URIs against the cache directory
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// URIs that were already cached
    pub retained: Vec<String>,
    /// URIs fetched and written to the cache during this sync
    pub fetched: Vec<String>,
    /// Cache ids deleted because no desired URI maps to them
    pub removed: Vec<String>,
    /// URIs that could not be fetched or parsed
    pub dropped: Vec<DroppedUri>,
}

impl SyncReport {
    /// Every URI that has a cache entry after the sync, in digest order
    pub fn available(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .retained
            .iter()
            .chain(self.fetched.iter())
            .cloned()
            .collect();
        uris.sort_by_key(|uri| digest(uri));
        uris
    }
}

/// Outcome of re-fetching one catalog
#[derive(Debug)]
pub struct CatalogUpdate {
    pub uri: String,
    /// The copy that was loaded before the update
    pub previous: FunctionCatalog,
    /// Set when the re-fetch failed
    pub error: Option<KaffineError>,
    /// Set when the previous copy could not be put back after a failed
    /// re-fetch; the catalog is then no longer tracked
    pub restore_error: Option<KaffineError>,
}

impl CatalogUpdate {
    /// Whether the catalog is still tracked after the update
    pub fn is_tracked(&self) -> bool {
        self.restore_error.is_none()
    }
}

/// Manages loaded catalogs and the function index they feed
pub struct CatalogManager {
    cache: CatalogCache,
    fetcher: Box<dyn Fetcher>,
    catalogs: BTreeMap<String, FunctionCatalog>,
    functions: BTreeMap<String, FunctionDefinition>,
}

impl CatalogManager {
    /// Open a manager over a cache directory using the file/HTTP transport
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_fetcher(cache_dir, Box::new(TransportFetcher::new()?))
    }

    /// Open a manager with a custom fetcher
    pub fn with_fetcher(cache_dir: impl Into<PathBuf>, fetcher: Box<dyn Fetcher>) -> Result<Self> {
        Ok(Self {
            cache: CatalogCache::open(cache_dir)?,
            fetcher,
            catalogs: BTreeMap::new(),
            functions: BTreeMap::new(),
        })
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Track a catalog, reading it from the cache when possible
    ///
    /// Fails without changing anything if the URI is already tracked, the
    /// catalog cannot be obtained, or any of its group names is already
    /// provided by another catalog.
    pub fn add_catalog(&mut self, uri: &str) -> Result<()> {
        if self.catalogs.contains_key(uri) {
            return Err(KaffineError::AlreadyPresent {
                uri: uri.to_string(),
            });
        }

        let catalog = match self.get_cached_catalog(uri) {
            Ok(catalog) => {
                tracing::debug!("Using cached catalog for {}", uri);
                catalog
            }
            Err(e) => {
                tracing::debug!("Cache unusable for {}: {}", uri, e);
                self.get_external_catalog(uri)?
            }
        };

        self.insert_catalog(uri, catalog)
    }

    /// Track an already-parsed catalog
    ///
    /// Used to put back a previous copy after a failed update. Applies the
    /// same duplicate and collision checks as [`add_catalog`](Self::add_catalog).
    pub fn restore_catalog(&mut self, uri: &str, catalog: FunctionCatalog) -> Result<()> {
        if self.catalogs.contains_key(uri) {
            return Err(KaffineError::AlreadyPresent {
                uri: uri.to_string(),
            });
        }
        self.insert_catalog(uri, catalog)
    }

    fn insert_catalog(&mut self, uri: &str, catalog: FunctionCatalog) -> Result<()> {
        let conflicts: Vec<String> = catalog
            .group_names()
            .into_iter()
            .filter(|name| self.functions.contains_key(name))
            .collect();

        if !conflicts.is_empty() {
            return Err(KaffineError::NameConflict {
                uri: uri.to_string(),
                names: conflicts,
            });
        }

        for function in catalog.functions() {
            self.functions
                .insert(function.group_name(), function.clone());
        }

        tracing::info!(
            "Loaded catalog {} ({} functions)",
            uri,
            catalog.functions().len()
        );
        self.catalogs.insert(uri.to_string(), catalog);

        Ok(())
    }

    /// Read and parse the cached copy of a catalog
    pub fn get_cached_catalog(&self, uri: &str) -> Result<FunctionCatalog> {
        let id = digest(uri);
        let bytes = self
            .cache
            .read(&id)?
            .ok_or_else(|| KaffineError::CacheMiss {
                uri: uri.to_string(),
                id: id.clone(),
            })?;

        FunctionCatalog::from_slice(&bytes, &self.cache.path_for(&id).display().to_string())
    }

    /// Fetch and parse a catalog from its source
    pub fn get_external_catalog(&self, uri: &str) -> Result<FunctionCatalog> {
        let bytes = self.fetcher.fetch(uri)?;
        FunctionCatalog::from_slice(&bytes, uri)
    }

    /// Stop tracking a catalog and drop its functions from the index
    pub fn remove_catalog(&mut self, uri: &str) -> Result<FunctionCatalog> {
        let catalog = self
            .catalogs
            .remove(uri)
            .ok_or_else(|| KaffineError::CatalogNotFound {
                uri: uri.to_string(),
            })?;

        for name in catalog.group_names() {
            self.functions.remove(&name);
        }

        tracing::info!("Removed catalog {}", uri);
        Ok(catalog)
    }

    /// Remove a catalog and load it again from its source
    ///
    /// Returns the previous copy. If the re-fetch fails the catalog stays
    /// removed; callers that want the old copy back use
    /// [`restore_catalog`](Self::restore_catalog).
    pub fn update_catalog(&mut self, uri: &str) -> Result<FunctionCatalog> {
        let previous = self.remove_catalog(uri)?;
        let catalog = self.get_external_catalog(uri)?;
        self.insert_catalog(uri, catalog)?;
        Ok(previous)
    }

    /// Re-fetch every tracked catalog from its source
    ///
    /// A catalog whose re-fetch fails gets its previous copy back before
    /// the next URI is processed, so a later catalog cannot claim its
    /// group names in the meantime.
    pub fn update_all_catalogs(&mut self) -> Vec<CatalogUpdate> {
        let uris: Vec<String> = self.catalogs.keys().cloned().collect();
        let mut updates = Vec::with_capacity(uris.len());

        for uri in uris {
            let Some(previous) = self.catalogs.get(&uri).cloned() else {
                continue;
            };

            let error = self.update_catalog(&uri).err();
            let mut restore_error = None;

            if let Some(e) = &error {
                tracing::warn!("Failed to update catalog {}: {}", uri, e);

                if let Err(restore) = self.restore_catalog(&uri, previous.clone()) {
                    tracing::error!("Lost catalog {}: {}", uri, restore);
                    restore_error = Some(restore);
                }
            }

            updates.push(CatalogUpdate {
                uri,
                previous,
                error,
                restore_error,
            });
        }

        updates
    }

    /// Search the function index
    ///
    /// The query is `[group/]name[@version]`. A function matches when its
    /// group name contains `group/name` (or just `name`). With a version,
    /// each result only keeps that exact version and functions lacking it
    /// are dropped. An empty result is not an error.
    pub fn search(&self, query: &str) -> Result<Vec<FunctionDefinition>> {
        let reference: FunctionRef = query.parse()?;
        Ok(self.search_ref(&reference))
    }

    pub fn search_ref(&self, reference: &FunctionRef) -> Vec<FunctionDefinition> {
        let needle = reference.group_name();

        self.functions
            .iter()
            .filter(|(key, _)| key.contains(&needle))
            .filter_map(|(_, function)| {
                let Some(version) = &reference.version else {
                    return Some(function.clone());
                };

                let selected = function.version(version)?.clone();
                Some(FunctionDefinition {
                    versions: vec![selected],
                    ..function.clone()
                })
            })
            .collect()
    }

    /// Exact lookup used for installation
    ///
    /// With a group the full group name must match; without one the kind
    /// must match, which can yield several functions from different groups.
    pub fn resolve(&self, reference: &FunctionRef) -> Vec<&FunctionDefinition> {
        match &reference.group {
            Some(_) => self
                .functions
                .get(&reference.group_name())
                .into_iter()
                .collect(),
            None => self
                .functions
                .values()
                .filter(|function| function.kind() == reference.name)
                .collect(),
        }
    }

    /// Reconcile the cache directory with a desired set of URIs
    ///
    /// Desired URIs and cache files are both ordered by digest and walked
    /// together: cached and desired entries are kept, desired but missing
    /// entries are fetched (or dropped if that fails), and cache files no
    /// URI maps to are deleted. Only filesystem errors abort the sync.
    pub fn sync(&self, desired: &[String]) -> Result<SyncReport> {
        let mut wanted: Vec<(String, &str)> = desired
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|uri| (digest(uri), uri.as_str()))
            .collect();
        wanted.sort();
        wanted.dedup_by(|a, b| a.0 == b.0);

        let cached = self.cache.list()?;

        let mut retained = Vec::new();
        let mut fetched = Vec::new();
        let mut removed = Vec::new();
        let mut dropped = Vec::new();

        merge_diff(
            &wanted,
            &cached,
            |(id, _), file| id.cmp(file),
            |(_, uri), _| {
                tracing::debug!("Catalog already cached: {}", uri);
                retained.push(uri.to_string());
                Ok(())
            },
            |(id, uri)| {
                match self.fetch_into_cache(id, uri) {
                    Ok(()) => fetched.push(uri.to_string()),
                    Err(e) if e.kind() == ErrorKind::Io => return Err(e),
                    Err(e) => {
                        tracing::warn!("Dropping catalog {}: {}", uri, e);
                        dropped.push(DroppedUri {
                            uri: uri.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
                Ok(())
            },
            |file| {
                self.cache.delete(file)?;
                removed.push(file.clone());
                Ok(())
            },
        )?;

        Ok(SyncReport {
            retained,
            fetched,
            removed,
            dropped,
        })
    }

    fn fetch_into_cache(&self, id: &str, uri: &str) -> Result<()> {
        let bytes = self.fetcher.fetch(uri)?;
        FunctionCatalog::from_slice(&bytes, uri)?;
        self.cache.write(id, &bytes)
    }

    /// Rewrite the cache directory from the tracked catalogs
    ///
    /// Clears the directory first; a failure part-way leaves it partially
    /// written.
    pub fn save(&self) -> Result<()> {
        self.cache.clear()?;

        for (uri, catalog) in &self.catalogs {
            self.cache.write(&digest(uri), catalog.to_yaml()?.as_bytes())?;
        }

        tracing::debug!("Saved {} catalogs to cache", self.catalogs.len());
        Ok(())
    }

    /// Tracked catalog URIs, sorted
    pub fn catalog_uris(&self) -> Vec<String> {
        self.catalogs.keys().cloned().collect()
    }

    pub fn catalog(&self, uri: &str) -> Option<&FunctionCatalog> {
        self.catalogs.get(uri)
    }

    pub fn catalogs(&self) -> impl Iterator<Item = (&String, &FunctionCatalog)> {
        self.catalogs.iter()
    }

    /// The function index, keyed by group name
    pub fn functions(&self) -> &BTreeMap<String, FunctionDefinition> {
        &self.functions
    }

    pub fn function(&self, group_name: &str) -> Option<&FunctionDefinition> {
        self.functions.get(group_name)
    }

    /// URI of the catalog that provides a group name
    pub fn catalog_for(&self, group_name: &str) -> Option<&str> {
        self.catalogs
            .iter()
            .find(|(_, catalog)| {
                catalog
                    .functions()
                    .iter()
                    .any(|f| f.group_name() == group_name)
            })
            .map(|(uri, _)| uri.as_str())
    }
}
