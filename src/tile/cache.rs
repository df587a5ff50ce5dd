//! Two-level cache for slippy-map tiles.
//!
//! Tiles are looked up in a size-bounded in-memory LRU first, then on disk,
//! and only then fetched from the tile server. Fetched tiles are written to
//! disk atomically and inserted into memory. A tile present on disk is never
//! fetched again; a failed fetch leaves nothing behind.
//!
//! # Disk Layout
//!
//! ```text
//! <root>/<server>/<zoom>/<x % 10>/<y % 10>/<x>,<y>.png
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::fetcher::TileFetcher;
use super::server::TileServer;
use crate::error::TileError;
use crate::storage;

/// Default in-memory capacity: 64MB of encoded tiles
pub const DEFAULT_TILE_MEMORY_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

// =============================================================================
// Cache Key
// =============================================================================

/// Identifies one tile image of one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Tile server name
    pub server: Arc<str>,

    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(server: impl Into<Arc<str>>, zoom: u8, x: u32, y: u32) -> Self {
        Self {
            server: server.into(),
            zoom,
            x,
            y,
        }
    }

    /// Path of this tile relative to the tile cache root.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&*self.server)
            .join(self.zoom.to_string())
            .join((self.x % 10).to_string())
            .join((self.y % 10).to_string())
            .join(format!("{},{}.png", self.x, self.y))
    }
}

// =============================================================================
// Memory Cache
// =============================================================================

/// LRU cache of encoded tile bytes with size-based capacity.
///
/// Evicts least-recently-used tiles when the total cached size exceeds
/// capacity. Safe to share across tasks via `Arc`.
pub struct TileMemoryCache {
    cache: RwLock<LruCache<TileKey, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl TileMemoryCache {
    /// Create a cache with the default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_MEMORY_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache bounded by both total bytes and entry count.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: NonZeroUsize) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(max_entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a tile, marking it as recently used.
    pub async fn get(&self, key: &TileKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check for a tile without updating LRU order.
    pub async fn contains(&self, key: &TileKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a tile, evicting LRU entries until back within capacity.
    pub async fn put(&self, key: TileKey, data: Bytes) {
        let data_size = data.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old_data) = cache.peek(&key) {
            *current_size = current_size.saturating_sub(old_data.len());
        }

        // The entry-count bound may push out an entry on its own
        if let Some((evicted_key, evicted)) = cache.push(key, data) {
            if cache.peek(&evicted_key).is_none() {
                *current_size = current_size.saturating_sub(evicted.len());
            }
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => *current_size = current_size.saturating_sub(evicted.len()),
                None => break,
            }
        }
    }

    /// Remove a tile, returning its bytes if present.
    pub async fn remove(&self, key: &TileKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let data = cache.pop(key)?;
        *current_size = current_size.saturating_sub(data.len());
        Some(data)
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Read-through tile cache backed by a [`TileFetcher`].
pub struct TileCache<F> {
    root: PathBuf,
    fetcher: F,
    memory: TileMemoryCache,
}

impl<F: TileFetcher> TileCache<F> {
    /// Create a tile cache storing tiles under `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Tile directory, usually `<cache>/tile`
    /// * `fetcher` - Source for tiles missing from disk
    pub fn new(root: impl Into<PathBuf>, fetcher: F) -> Self {
        Self::with_memory(root, fetcher, TileMemoryCache::new())
    }

    /// Create a tile cache with a custom in-memory front.
    pub fn with_memory(root: impl Into<PathBuf>, fetcher: F, memory: TileMemoryCache) -> Self {
        Self {
            root: root.into(),
            fetcher,
            memory,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn memory(&self) -> &TileMemoryCache {
        &self.memory
    }

    /// On-disk location of a tile.
    pub fn tile_path(&self, server: &TileServer, zoom: u8, x: u32, y: u32) -> PathBuf {
        self.root
            .join(TileKey::new(server.name(), zoom, x, y).relative_path())
    }

    /// Return the encoded tile at `(zoom, x, y)` from `server`.
    ///
    /// # Errors
    ///
    /// - [`TileError::OutOfRange`] if either index is outside `[0, 2^zoom)`
    /// - Any fetch error from the [`TileFetcher`]
    /// - [`TileError::Io`] if the tile cannot be read or stored
    pub async fn get_tile(
        &self,
        server: &TileServer,
        zoom: u8,
        x: i64,
        y: i64,
    ) -> Result<Bytes, TileError> {
        let (tx, ty) = checked_index(zoom, x, y)?;
        let key = TileKey::new(server.name(), zoom, tx, ty);

        if let Some(data) = self.memory.get(&key).await {
            return Ok(data);
        }

        let path = self.root.join(key.relative_path());
        if let Some(data) = storage::read_optional(&path)
            .await
            .map_err(|e| TileError::Io(e.to_string()))?
        {
            let data = Bytes::from(data);
            self.memory.put(key, data.clone()).await;
            return Ok(data);
        }

        let url = server.url(zoom, tx, ty);
        let data = self.fetcher.fetch(&url).await?;
        debug!(url = %url, bytes = data.len(), "tile fetched");

        storage::write_atomic(&path, &data)
            .await
            .map_err(|e| TileError::Io(e.to_string()))?;
        info!(path = %path.display(), "tile stored");

        self.memory.put(key, data.clone()).await;
        Ok(data)
    }
}

fn checked_index(zoom: u8, x: i64, y: i64) -> Result<(u32, u32), TileError> {
    let count = 1_i64 << zoom.min(31);
    if !(0..count).contains(&x) || !(0..count).contains(&y) {
        return Err(TileError::OutOfRange { zoom, x, y });
    }
    // Both indices are below 2^31 here
    Ok((x as u32, y as u32))
}

// =============================================================================
// Tests
// =============================================================================
