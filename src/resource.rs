//! Icon Resource Cache
//!
//! Fetches the image behind a locator, decodes it once, and memoizes the
//! decoded handle. The entry is installed before the fetch resolves, so
//! concurrent callers for the same locator share one in-flight request; a
//! failed fetch evicts the entry so the next call retries from scratch.
//! Successful entries are retained for the cache lifetime: no TTL, no size
//! bound.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Decoded, shareable image handle.
pub type IconImage = Arc<RgbaImage>;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource fetch failed for {locator}: {status}")]
    Fetch { locator: String, status: String },

    #[error("resource decode failed for {locator}: {reason}")]
    Decode { locator: String, reason: String },
}

/// Transport seam: yields the raw bytes behind a locator.
///
/// The cache is agnostic to the transport as long as the bytes decode into
/// a raster image. Tests substitute counting fakes here.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ResourceError>;
}

/// Default fetcher: HTTP(S) GET.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ResourceError> {
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| ResourceError::Fetch {
                locator: locator.to_string(),
                status: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ResourceError::Fetch {
                locator: locator.to_string(),
                status: response.status().to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ResourceError::Fetch {
            locator: locator.to_string(),
            status: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

/// Cache counters; observability only, never policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Session-wide icon cache.
///
/// Explicit and injectable, never a hidden singleton: create one per
/// session, share it by `Arc`, call [`ResourceCache::clear`] to reset.
pub struct ResourceCache {
    fetcher: Arc<dyn ResourceFetcher>,
    entries: Mutex<HashMap<String, Arc<OnceCell<IconImage>>>>,
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResourceCache {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache backed by the default HTTP fetcher.
    pub fn with_http_fetcher() -> Self {
        Self::new(Arc::new(HttpFetcher::new()))
    }

    /// Fetch-and-decode with memoization.
    ///
    /// At most one fetch per locator is in flight at a time; that is the
    /// cache's sole concurrency guarantee. Errors evict the entry.
    pub async fn get(&self, locator: &str) -> Result<IconImage, ResourceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let cell = {
            let mut entries = self.entries.lock().await;
            match entries.get(locator) {
                Some(cell) => cell.clone(),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    entries.insert(locator.to_string(), cell.clone());
                    cell
                }
            }
        };

        if cell.initialized() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }

        let result = cell
            .get_or_try_init(|| async {
                debug!(locator, "fetching resource");
                let bytes = self.fetcher.fetch(locator).await?;
                let decoded =
                    image::load_from_memory(&bytes).map_err(|e| ResourceError::Decode {
                        locator: locator.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Arc::new(decoded.to_rgba8()))
            })
            .await;

        match result {
            Ok(image) => Ok(image.clone()),
            Err(err) => {
                self.evict_uninitialized(locator, &cell).await;
                Err(err)
            }
        }
    }

    /// Drop a failed entry so the next `get` retries from scratch. Only the
    /// exact cell we raced on is removed; a concurrently re-inserted entry
    /// survives.
    async fn evict_uninitialized(&self, locator: &str, cell: &Arc<OnceCell<IconImage>>) {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(locator) {
            if Arc::ptr_eq(existing, cell) && !existing.initialized() {
                entries.remove(locator);
                self.evictions.fetch_add(1, Ordering::SeqCst);
                debug!(locator, "evicted failed resource entry");
            }
        }
    }

    /// True if a successfully decoded entry exists for the locator.
    pub async fn contains(&self, locator: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(locator)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Number of entries (resolved or in flight).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Empty the cache. In-flight fetches finish but their results are
    /// dropped with the old cells.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::SeqCst),
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            evictions: self.evictions.load(Ordering::SeqCst),
        }
    }
}
