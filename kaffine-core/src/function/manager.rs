//! Function manager
//!
//! Owns the installed function set. Installs resolve against the catalog
//! manager's index; `save` writes the installed set, config and catalog
//! cache back to the state directory.

use std::collections::BTreeMap;

use super::InstalledFunction;
use crate::catalog::{
    CatalogManager, DroppedUri, Fetcher, FunctionCatalog, FunctionDefinition, FunctionRef,
    SyncReport, TransportFetcher,
};
use crate::config::Config;
use crate::error::{KaffineError, Result};
use crate::paths::KaffinePaths;

/// Name of the generated catalog listing installed functions
pub const INSTALLED_CATALOG_NAME: &str = "Kaffine Managed Functions";

/// A configured dependency that could not be installed on load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDependency {
    pub reference: String,
    pub reason: String,
}

/// What construction had to give up on
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    pub sync: SyncReport,
    /// Catalogs that were fetched or cached but could not be loaded
    pub rejected_catalogs: Vec<DroppedUri>,
    pub dropped_dependencies: Vec<DroppedDependency>,
}

impl LoadReport {
    /// Every catalog URI removed from the configuration on load
    pub fn dropped_catalogs(&self) -> impl Iterator<Item = &DroppedUri> {
        self.sync.dropped.iter().chain(self.rejected_catalogs.iter())
    }

    pub fn is_clean(&self) -> bool {
        self.sync.dropped.is_empty()
            && self.rejected_catalogs.is_empty()
            && self.dropped_dependencies.is_empty()
    }
}

/// Result of an install
#[derive(Debug, Clone)]
pub struct Installation {
    pub function: InstalledFunction,
    /// The entry this install replaced, if any
    pub replaced: Option<InstalledFunction>,
}

/// Result of removing a catalog
#[derive(Debug)]
pub struct CatalogRemoval {
    pub catalog: FunctionCatalog,
    /// Installed functions that came from the removed catalog
    pub orphaned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// Result of refreshing catalogs and installed functions
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub upgraded: Vec<Upgrade>,
    pub unchanged: Vec<String>,
    /// Installed functions no longer offered by any catalog (kept as-is)
    pub missing: Vec<String>,
    /// Catalogs whose refresh failed; the previous copy was restored
    pub failed_catalogs: Vec<DroppedUri>,
    /// Catalogs whose refresh failed and whose previous copy could not be
    /// put back; they are no longer tracked
    pub lost_catalogs: Vec<DroppedUri>,
}

/// Manages the installed function set
pub struct FunctionManager {
    paths: KaffinePaths,
    catalogs: CatalogManager,
    config: Config,
    installed: BTreeMap<String, InstalledFunction>,
    load_report: LoadReport,
}

impl FunctionManager {
    /// Load the state directory using the file/HTTP transport
    pub fn open(paths: KaffinePaths) -> Result<Self> {
        Self::open_with_fetcher(paths, Box::new(TransportFetcher::new()?))
    }

    /// Load the state directory with a custom fetcher
    ///
    /// Syncs the catalog cache with the configured catalogs, loads every
    /// catalog that survives, then replays the configured dependencies
    /// through [`install`](Self::install). Catalogs and dependencies that
    /// fail are dropped from the in-memory config and recorded in the
    /// [`LoadReport`].
    pub fn open_with_fetcher(paths: KaffinePaths, fetcher: Box<dyn Fetcher>) -> Result<Self> {
        paths.ensure_root()?;

        let mut catalogs = CatalogManager::with_fetcher(paths.catalogs_dir(), fetcher)?;
        let mut config = Config::load_from_path(&paths.config_file())?;
        let mut load_report = LoadReport {
            sync: catalogs.sync(&config.catalogs)?,
            ..LoadReport::default()
        };

        for uri in load_report.sync.available() {
            if let Err(e) = catalogs.add_catalog(&uri) {
                tracing::warn!("Dropping catalog {}: {}", uri, e);
                load_report.rejected_catalogs.push(DroppedUri {
                    uri,
                    reason: e.to_string(),
                });
            }
        }
        config.catalogs = catalogs.catalog_uris();

        let mut manager = Self {
            paths,
            catalogs,
            config,
            installed: BTreeMap::new(),
            load_report,
        };

        let dependencies = manager.config.dependencies.krm_functions.clone();
        for reference in dependencies {
            if let Err(e) = manager.install(&reference) {
                tracing::warn!("Dropping dependency {}: {}", reference, e);
                manager
                    .load_report
                    .dropped_dependencies
                    .push(DroppedDependency {
                        reference,
                        reason: e.to_string(),
                    });
            }
        }
        manager.config.dependencies.krm_functions = manager.dependency_refs();

        Ok(manager)
    }

    /// Install a function by `[group/]name[@version]`
    ///
    /// Without a version the highest version is selected and the entry is
    /// left unpinned; with one that exact version is selected and pinned.
    /// Any existing entry for the same function is replaced.
    pub fn install(&mut self, fname: &str) -> Result<Installation> {
        let reference: FunctionRef = fname.parse()?;
        let definition = self.resolve_one(&reference)?;

        let (version, pinned) = match &reference.version {
            Some(label) => {
                let version = definition
                    .version(label)
                    .ok_or_else(|| KaffineError::VersionNotFound {
                        name: definition.group_name(),
                        version: label.clone(),
                    })?;
                (version.clone(), true)
            }
            None => {
                let version = definition
                    .highest_version()
                    .ok_or_else(|| KaffineError::FunctionNotFound {
                        name: definition.group_name(),
                    })?;
                (version.clone(), false)
            }
        };

        let function = InstalledFunction::new(definition, version, pinned);
        let replaced = self
            .installed
            .insert(function.group_name(), function.clone());

        tracing::info!(
            "Installed {}{}",
            function.short_name(),
            if pinned { " (pinned)" } else { "" }
        );

        Ok(Installation { function, replaced })
    }

    fn resolve_one(&self, reference: &FunctionRef) -> Result<&FunctionDefinition> {
        let matches = self.catalogs.resolve(reference);

        match matches.as_slice() {
            [] => Err(KaffineError::FunctionNotFound {
                name: reference.group_name(),
            }),
            [definition] => Ok(*definition),
            _ => Err(KaffineError::Ambiguous {
                query: reference.group_name(),
                matches: matches.iter().map(|d| d.group_name()).collect(),
            }),
        }
    }

    /// Remove an installed function by `[group/]name[@version]`
    pub fn remove(&mut self, fname: &str) -> Result<InstalledFunction> {
        let reference: FunctionRef = fname.parse()?;

        let candidates: Vec<String> = match &reference.group {
            Some(_) => self
                .installed
                .get_key_value(&reference.group_name())
                .map(|(key, _)| key.clone())
                .into_iter()
                .collect(),
            None => self
                .installed
                .iter()
                .filter(|(_, f)| f.definition().kind() == reference.name)
                .map(|(key, _)| key.clone())
                .collect(),
        };

        let key = match candidates.as_slice() {
            [] => {
                return Err(KaffineError::NotInstalled {
                    name: reference.to_string(),
                })
            }
            [key] => key.clone(),
            _ => {
                return Err(KaffineError::Ambiguous {
                    query: reference.group_name(),
                    matches: candidates,
                })
            }
        };

        if let Some(version) = &reference.version {
            let installed_version = self.installed.get(&key).map(|f| f.version().name.as_str());
            if installed_version != Some(version.as_str()) {
                return Err(KaffineError::NotInstalled {
                    name: reference.to_string(),
                });
            }
        }

        let removed = self
            .installed
            .remove(&key)
            .ok_or_else(|| KaffineError::NotInstalled { name: key.clone() })?;

        tracing::info!("Removed {}", removed.short_name());
        Ok(removed)
    }

    /// Refresh every catalog and move unpinned functions to their highest version
    ///
    /// A catalog whose refresh fails keeps its previous copy. Pinned
    /// functions are re-read at their pinned version.
    pub fn update(&mut self) -> Result<UpdateReport> {
        let mut report = UpdateReport::default();

        for update in self.catalogs.update_all_catalogs() {
            let Some(error) = update.error else {
                continue;
            };

            match update.restore_error {
                None => report.failed_catalogs.push(DroppedUri {
                    uri: update.uri,
                    reason: error.to_string(),
                }),
                Some(restore_error) => report.lost_catalogs.push(DroppedUri {
                    uri: update.uri,
                    reason: format!("{error}; previous copy not restored: {restore_error}"),
                }),
            }
        }

        let names: Vec<String> = self.installed.keys().cloned().collect();
        for name in names {
            let Some(current) = self.installed.get(&name) else {
                continue;
            };
            let Some(definition) = self.catalogs.function(&name) else {
                report.missing.push(name);
                continue;
            };

            let selected = if current.pinned() {
                definition.version(&current.version().name)
            } else {
                definition.highest_version()
            };
            let Some(selected) = selected else {
                report.missing.push(name);
                continue;
            };

            let from = current.version().name.clone();
            let refreshed = InstalledFunction::new(definition, selected.clone(), current.pinned());

            if refreshed.version().name == from {
                report.unchanged.push(name.clone());
            } else {
                report.upgraded.push(Upgrade {
                    name: name.clone(),
                    from,
                    to: refreshed.version().name.clone(),
                });
            }

            self.installed.insert(name, refreshed);
        }

        for upgrade in &report.upgraded {
            tracing::info!("Updated {} {} -> {}", upgrade.name, upgrade.from, upgrade.to);
        }

        Ok(report)
    }

    /// Track a new catalog
    pub fn add_catalog(&mut self, uri: &str) -> Result<()> {
        self.catalogs.add_catalog(uri)?;
        self.config.catalogs = self.catalogs.catalog_uris();
        Ok(())
    }

    /// Stop tracking a catalog; installed functions are kept
    pub fn remove_catalog(&mut self, uri: &str) -> Result<CatalogRemoval> {
        let catalog = self.catalogs.remove_catalog(uri)?;
        self.config.catalogs = self.catalogs.catalog_uris();

        let orphaned = catalog
            .group_names()
            .into_iter()
            .filter(|name| self.installed.contains_key(name))
            .collect();

        Ok(CatalogRemoval { catalog, orphaned })
    }

    /// Search all loaded catalogs
    pub fn search(&self, query: &str) -> Result<Vec<FunctionDefinition>> {
        self.catalogs.search(query)
    }

    /// A catalog listing every installed function
    pub fn generate_installed_catalog(&self) -> FunctionCatalog {
        let mut catalog = FunctionCatalog::new(INSTALLED_CATALOG_NAME);
        catalog.spec.krm_functions = self
            .installed
            .values()
            .map(|f| f.definition().clone())
            .collect();
        catalog
    }

    /// Persist everything to the state directory
    ///
    /// Writes function files and `installed.yaml` first, then the config,
    /// then the catalog cache. Nothing is transactional: a failure part-way
    /// can leave these out of step with each other.
    pub fn save(&mut self) -> Result<()> {
        self.config.dependencies.krm_functions = self.dependency_refs();
        self.config.catalogs = self.catalogs.catalog_uris();

        let functions_dir = self.paths.functions_dir();
        if functions_dir.exists() {
            std::fs::remove_dir_all(&functions_dir)
                .map_err(|e| KaffineError::io(&functions_dir, e))?;
        }

        for function in self.installed.values() {
            let definition = function.definition();
            let path = self.paths.function_file(&definition.group, definition.kind());
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| KaffineError::io(parent, e))?;
            }
            std::fs::write(&path, function.to_yaml()?).map_err(|e| KaffineError::io(&path, e))?;
        }

        let installed_file = self.paths.installed_file();
        let installed_catalog = self.generate_installed_catalog().to_yaml()?;
        std::fs::write(&installed_file, installed_catalog)
            .map_err(|e| KaffineError::io(&installed_file, e))?;

        self.config.save_to_path(&self.paths.config_file())?;
        self.catalogs.save()?;

        tracing::info!(
            "Saved {} installed functions and {} catalogs to {}",
            self.installed.len(),
            self.config.catalogs.len(),
            self.paths.root().display()
        );
        Ok(())
    }

    fn dependency_refs(&self) -> Vec<String> {
        self.installed
            .values()
            .map(|f| f.reference().to_string())
            .collect()
    }

    /// Installed functions keyed by group name
    pub fn installed(&self) -> &BTreeMap<String, InstalledFunction> {
        &self.installed
    }

    pub fn installed_function(&self, group_name: &str) -> Option<&InstalledFunction> {
        self.installed.get(group_name)
    }

    pub fn catalogs(&self) -> &CatalogManager {
        &self.catalogs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &KaffinePaths {
        &self.paths
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }
}
