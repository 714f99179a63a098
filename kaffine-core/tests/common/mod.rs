//! Test helpers shared by the integration tests
//!
//! Catalogs are written to real files and referenced by `file://` URIs so
//! the tests go through the same transport as the CLI.

#![allow(dead_code)]

use anyhow::Result;
use kaffine_core::{FunctionManager, KaffinePaths};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A project directory with a state directory and a place for catalog sources
pub struct TestProject {
    pub dir: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        init_test_logging();
        Ok(Self {
            dir: tempfile::TempDir::new()?,
        })
    }

    pub fn paths(&self) -> KaffinePaths {
        KaffinePaths::new(self.dir.path().join(".kaffine"))
    }

    pub fn open(&self) -> Result<FunctionManager> {
        Ok(FunctionManager::open(self.paths())?)
    }

    /// Write a catalog source file and return its `file://` URI
    pub fn write_catalog(&self, file_name: &str, content: &str) -> Result<String> {
        let sources = self.dir.path().join("sources");
        fs::create_dir_all(&sources)?;
        let path = sources.join(file_name);
        fs::write(&path, content)?;
        file_uri(&path)
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.dir.path().join("sources").join(file_name)
    }
}

pub fn file_uri(path: &Path) -> Result<String> {
    reqwest::Url::from_file_path(path)
        .map(|url| url.to_string())
        .map_err(|_| anyhow::anyhow!("not an absolute path: {}", path.display()))
}

/// A catalog document with container runtimes
pub fn catalog(group: &str, functions: &[(&str, &[&str])]) -> String {
    let mut doc = String::from(
        "apiVersion: config.kubernetes.io/v1alpha1\n\
         kind: KRMFunctionCatalog\n\
         metadata:\n  name: test catalog\n\
         spec:\n  krmFunctions:\n",
    );

    for (kind, versions) in functions {
        doc.push_str(&format!(
            "  - group: {group}\n    description: {kind} function\n    publisher: {group}.io\n    names:\n      kind: {kind}\n    versions:\n"
        ));
        for version in *versions {
            doc.push_str(&format!(
                "    - name: {version}\n      license: Apache-2.0\n      runtime:\n        container:\n          image: ghcr.io/{group}/{}:{version}\n",
                kind.to_lowercase()
            ));
        }
    }

    doc
}
