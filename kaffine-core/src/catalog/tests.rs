//! Shared fixtures and cross-module tests for the catalog module

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::catalog::{
    ContainerRuntime, Fetcher, FunctionCatalog, FunctionDefinition, FunctionNames,
    FunctionVersion, Runtime,
};
use crate::error::{KaffineError, Result};

/// Build a catalog document with one group and the given kinds/versions
pub(crate) fn catalog_yaml(group: &str, functions: &[(&str, &[&str])]) -> String {
    let mut catalog = FunctionCatalog::new(&format!("{group} catalog"));

    for (kind, versions) in functions {
        catalog.spec.krm_functions.push(FunctionDefinition {
            group: group.to_string(),
            description: format!("{kind} function"),
            publisher: format!("{group}.io"),
            names: FunctionNames {
                kind: kind.to_string(),
            },
            versions: versions
                .iter()
                .map(|v| FunctionVersion {
                    name: v.to_string(),
                    idempotent: true,
                    usage: String::new(),
                    examples: vec![],
                    license: "Apache-2.0".to_string(),
                    runtime: Runtime::Container(ContainerRuntime {
                        image: format!("ghcr.io/{group}/{}:{v}", kind.to_lowercase()),
                        sha256: None,
                        require_network: false,
                        require_storage_mount: false,
                    }),
                    maintainers: vec![],
                })
                .collect(),
            home: None,
            maintainers: vec![],
            tags: vec![],
        });
    }

    catalog.to_yaml().unwrap()
}

/// In-memory fetcher; clones share the same documents
#[derive(Clone, Default)]
pub(crate) struct MemoryFetcher {
    documents: Rc<RefCell<HashMap<String, String>>>,
    fetches: Rc<Cell<usize>>,
}

impl MemoryFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, uri: &str, content: &str) -> Self {
        self.set(uri, content);
        self
    }

    pub(crate) fn set(&self, uri: &str, content: &str) {
        self.documents
            .borrow_mut()
            .insert(uri.to_string(), content.to_string());
    }

    pub(crate) fn remove(&self, uri: &str) {
        self.documents.borrow_mut().remove(uri);
    }

    /// Shared count of fetch calls
    pub(crate) fn counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.fetches)
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.fetches.set(self.fetches.get() + 1);
        self.documents
            .borrow()
            .get(uri)
            .map(|content| content.as_bytes().to_vec())
            .ok_or_else(|| KaffineError::transport(uri, "HTTP 404 Not Found"))
    }
}

mod catalog_flow_tests {
    use super::*;
    use crate::catalog::{digest, CatalogManager};
    use crate::error::ErrorKind;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    const URIS: [&str; 4] = [
        "file:///a.yaml",
        "file:///b.yaml",
        "https://example.com/c.yaml",
        "https://example.com/d.yaml",
    ];

    fn fetcher_with_all() -> MemoryFetcher {
        URIS.iter().enumerate().fold(MemoryFetcher::new(), |f, (i, uri)| {
            f.with(uri, &catalog_yaml(&format!("group{i}"), &[("Fn", &["v1"])]))
        })
    }

    /// After any sequence of syncs the cache holds exactly the desired digests
    #[test]
    fn test_sync_converges_for_every_subset() {
        let temp_dir = TempDir::new().unwrap();
        let cm = CatalogManager::with_fetcher(temp_dir.path(), Box::new(fetcher_with_all()))
            .unwrap();

        // Walk all 16 subsets, plus the reverse order so each step both adds and removes
        let masks: Vec<usize> = (0..16).chain((0..16).rev()).collect();
        for mask in masks {
            let desired: Vec<String> = URIS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, uri)| uri.to_string())
                .collect();

            let report = cm.sync(&desired).unwrap();
            assert!(report.dropped.is_empty());

            let expected: BTreeSet<String> = desired.iter().map(|u| digest(u)).collect();
            let actual: BTreeSet<String> = cm.cache().list().unwrap().into_iter().collect();
            assert_eq!(actual, expected, "mask {mask:04b}");
        }
    }

    #[test]
    fn test_sync_then_add_uses_cache_only() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = fetcher_with_all();
        let fetches = fetcher.counter();
        let mut cm = CatalogManager::with_fetcher(temp_dir.path(), Box::new(fetcher)).unwrap();

        let desired: Vec<String> = URIS.iter().map(|u| u.to_string()).collect();
        let report = cm.sync(&desired).unwrap();
        assert_eq!(fetches.get(), 4);

        for uri in report.available() {
            cm.add_catalog(&uri).unwrap();
        }

        assert_eq!(fetches.get(), 4);
        assert_eq!(cm.functions().len(), 4);
    }

    /// The worked example: one catalog, two versions of acme/Logger
    #[test]
    fn test_logger_search_example() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = MemoryFetcher::new().with(
            "file:///a.yaml",
            &catalog_yaml("acme", &[("Logger", &["v1.0.0", "v1.0.1"])]),
        );
        let mut cm = CatalogManager::with_fetcher(temp_dir.path(), Box::new(fetcher)).unwrap();
        cm.add_catalog("file:///a.yaml").unwrap();

        let all = cm.search("Logger").unwrap();
        assert_eq!(all.len(), 1);
        let versions: Vec<&str> = all[0].versions.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(versions, vec!["v1.0.0", "v1.0.1"]);

        let pinned = cm.search("Logger@v1.0.0").unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].versions.len(), 1);
        assert_eq!(pinned[0].versions[0].name, "v1.0.0");

        let qualified = cm.search("acme/Logger").unwrap();
        assert_eq!(qualified.len(), 1);
        assert!(cm.search("other/Logger").unwrap().is_empty());
    }

    #[test]
    fn test_second_catalog_with_same_function_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = MemoryFetcher::new()
            .with("file:///a.yaml", &catalog_yaml("acme", &[("Logger", &["v1.0.0"])]))
            .with("file:///b.yaml", &catalog_yaml("acme", &[("Logger", &["v2.0.0"])]));
        let mut cm = CatalogManager::with_fetcher(temp_dir.path(), Box::new(fetcher)).unwrap();

        cm.add_catalog("file:///a.yaml").unwrap();
        let before: Vec<String> = cm.functions().keys().cloned().collect();

        let err = cm.add_catalog("file:///b.yaml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let after: Vec<String> = cm.functions().keys().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(
            cm.function("acme/Logger").unwrap().versions[0].name,
            "v1.0.0"
        );
        assert!(cm.catalog("file:///b.yaml").is_none());
    }

    #[test]
    fn test_malformed_query_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let cm = CatalogManager::with_fetcher(temp_dir.path(), Box::new(MemoryFetcher::new()))
            .unwrap();
        let err = cm.search("acme/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
