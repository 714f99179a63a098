//! Content-addressed catalog cache
//!
//! Each tracked catalog is stored as `<digest(uri)>.yaml` inside the cache
//! directory. The digest is one-way, so the URI itself is never recoverable
//! from the directory listing; callers reconcile by digesting their URIs.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{KaffineError, Result};

/// Extension used for cached catalog files
const CACHE_EXTENSION: &str = "yaml";

/// Map a URI to its cache identifier (lowercase hex SHA-256)
pub fn digest(uri: &str) -> String {
    hex::encode(Sha256::digest(uri.as_bytes()))
}

/// Catalog bytes keyed by URI digest
#[derive(Debug, Clone)]
pub struct CatalogCache {
    dir: PathBuf,
}

impl CatalogCache {
    /// Open (and create if needed) a cache directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| KaffineError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file for an identifier
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{CACHE_EXTENSION}"))
    }

    /// Read cached bytes, `Ok(None)` when the entry does not exist
    pub fn read(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KaffineError::io(path, e)),
        }
    }

    pub fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(id);
        std::fs::write(&path, bytes).map_err(|e| KaffineError::io(&path, e))?;
        tracing::debug!("Cached catalog: {}", path.display());
        Ok(())
    }

    /// Delete a cache entry; deleting a missing entry is not an error
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed cached catalog: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KaffineError::io(path, e)),
        }
    }

    /// Identifiers of every cached catalog, sorted lexicographically
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| KaffineError::io(&self.dir, e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| KaffineError::io(&self.dir, e))?.path();

            if !path.is_file() {
                continue;
            }
            if path.extension().map(|e| e == CACHE_EXTENSION) != Some(true) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Remove every entry and recreate the empty directory
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir).map_err(|e| KaffineError::io(&self.dir, e))?;
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| KaffineError::io(&self.dir, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_digest_is_stable_and_distinct() {
        let a = digest("https://example.com/catalog.yaml");
        let b = digest("https://other.com/catalog.yaml");

        assert_eq!(a, digest("https://example.com/catalog.yaml"));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_write_read_delete() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CatalogCache::open(temp_dir.path().join("catalogs")).unwrap();
        let id = digest("file:///a.yaml");

        assert!(cache.read(&id).unwrap().is_none());

        cache.write(&id, b"kind: KRMFunctionCatalog").unwrap();
        assert_eq!(
            cache.read(&id).unwrap().as_deref(),
            Some(&b"kind: KRMFunctionCatalog"[..])
        );
        assert!(cache.path_for(&id).ends_with(format!("{id}.yaml")));

        cache.delete(&id).unwrap();
        assert!(cache.read(&id).unwrap().is_none());

        // Deleting again is a no-op
        cache.delete(&id).unwrap();
    }

    #[test]
    fn test_list_is_sorted_and_ignores_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CatalogCache::open(temp_dir.path()).unwrap();

        cache.write("ccc", b"c").unwrap();
        cache.write("aaa", b"a").unwrap();
        cache.write("bbb", b"b").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(temp_dir.path().join("nested.yaml")).unwrap();

        assert_eq!(cache.list().unwrap(), vec!["aaa", "bbb", "ccc"]);
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CatalogCache::open(temp_dir.path().join("catalogs")).unwrap();
        cache.write("aaa", b"a").unwrap();

        cache.clear().unwrap();

        assert!(cache.dir().exists());
        assert!(cache.list().unwrap().is_empty());
    }
}
