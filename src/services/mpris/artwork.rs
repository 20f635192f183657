use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, instrument, warn};
use url::Url;

/// Errors raised while caching artwork. Never leave this module.
#[derive(thiserror::Error, Debug)]
pub enum ArtworkError {
    /// Locator could not be resolved against the hub address
    #[error("invalid artwork locator: {0}")]
    InvalidLocator(#[from] url::ParseError),

    /// Request failed before a response arrived
    #[error("artwork request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("artwork request to {url} returned {status}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Cache file could not be written
    #[error("artwork cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Cache key for a locator: hex SHA-256 digest
pub fn cache_key(locator: &str) -> String {
    hex::encode(Sha256::digest(locator.as_bytes()))
}

/// Local reference published as `mpris:artUrl`
pub fn local_reference(path: &Path) -> String {
    format!("file://{}", path.display())
}

type Entry = Arc<OnceCell<PathBuf>>;

struct Inner {
    dir: PathBuf,
    base: Url,
    http: reqwest::Client,
    entries: Mutex<HashMap<String, Entry>>,
}

/// On-disk artwork cache keyed by locator digest.
///
/// Entries are never evicted. Concurrent requests for one locator share a
/// single download.
#[derive(Clone)]
pub struct ArtworkCache {
    inner: Arc<Inner>,
}

impl ArtworkCache {
    /// Cache storing files in `dir`, resolving relative locators against `base`
    pub fn new(dir: PathBuf, base: Url, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                dir,
                base,
                http,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolve a locator to a local reference.
    ///
    /// Returns an empty string when the artwork could not be fetched. Nothing
    /// is cached on failure, so the next call tries again.
    #[instrument(skip_all)]
    pub async fn resolve(&self, locator: &str) -> String {
        if locator.is_empty() {
            return String::new();
        }

        let key = cache_key(locator);
        let entry = self.entry(&key).await;

        match entry
            .get_or_try_init(|| self.fetch(locator, &key))
            .await
        {
            Ok(path) => local_reference(path),
            Err(e) => {
                warn!(error = %e, "Cannot cache artwork");
                String::new()
            }
        }
    }

    async fn entry(&self, key: &str) -> Entry {
        let mut entries = self.inner.entries.lock().await;
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn fetch(&self, locator: &str, key: &str) -> Result<PathBuf, ArtworkError> {
        let path = self.inner.dir.join(key);

        if fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Artwork already on disk");
            return Ok(path);
        }

        let url = self.inner.base.join(locator)?;
        let partial = path.with_extension("part");

        if let Err(e) = self.download(&url, &partial).await {
            match fs::remove_file(&partial).await {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    debug!(error = %cleanup, "Cannot remove partial artwork file");
                }
                _ => {}
            }
            return Err(e);
        }

        fs::rename(&partial, &path).await?;
        debug!(%url, path = %path.display(), "Artwork cached");

        Ok(path)
    }

    async fn download(&self, url: &Url, destination: &Path) -> Result<(), ArtworkError> {
        let mut response = self.inner.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtworkError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = fs::File::create(destination).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}
