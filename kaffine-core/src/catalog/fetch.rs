//! Fetching raw catalog bytes from a URI
//!
//! `file:` URIs are read from the local filesystem; every other scheme
//! goes to a blocking HTTP GET, so a scheme the client cannot speak fails
//! there as a transport error.

use reqwest::Url;
use std::path::Path;
use std::time::Duration;

use crate::error::{KaffineError, Result};

/// Request timeout for remote catalogs
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of catalog bytes
pub trait Fetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Fetcher backed by the local filesystem and HTTP(S)
pub struct TransportFetcher {
    client: reqwest::blocking::Client,
}

impl TransportFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("kaffine/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| KaffineError::transport("<client>", e))?;

        Ok(Self { client })
    }

    fn fetch_file(&self, uri: &str, path: &Path) -> Result<Vec<u8>> {
        tracing::debug!("Reading catalog from {}", path.display());
        std::fs::read(path).map_err(|e| KaffineError::transport(uri, format!("{}: {e}", path.display())))
    }

    fn fetch_http(&self, uri: &str) -> Result<Vec<u8>> {
        tracing::info!("Fetching catalog from {}", uri);

        let response = self
            .client
            .get(uri)
            .send()
            .map_err(|e| KaffineError::transport(uri, e))?;

        if !response.status().is_success() {
            return Err(KaffineError::transport(
                uri,
                format!("HTTP {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .map_err(|e| KaffineError::transport(uri, e))?;
        Ok(bytes.to_vec())
    }
}

impl Fetcher for TransportFetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            // Bare paths are treated as local files
            Err(_) if !uri.is_empty() => return self.fetch_file(uri, Path::new(uri)),
            Err(e) => return Err(KaffineError::transport(uri, e)),
        };

        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| KaffineError::transport(uri, "not a local file path"))?;
                self.fetch_file(uri, &path)
            }
            _ => self.fetch_http(uri),
        }
    }
}
