//! Read-through disk cache for derived images.
//!
//! `get` serves a cached file when it is fresh enough and otherwise runs the
//! caller's generator, writes its output atomically and serves that.
//!
//! # Concurrency
//!
//! Concurrent requests for the same path are serialized by a per-path async
//! mutex, so a stale artifact is generated once and every waiter reads the
//! result. Locks are dropped from the table when their last holder is done.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{ArtifactError, RenderError};
use crate::storage;

/// When a cached artifact may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Any existing file is valid; its content depends only on its path
    Exists,
    /// The file must have been modified at or after this instant
    Since(SystemTime),
}

impl Freshness {
    pub fn accepts(&self, modified: SystemTime) -> bool {
        match self {
            Self::Exists => true,
            Self::Since(threshold) => modified >= *threshold,
        }
    }
}

/// A derived image read from, or just written to, the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub data: Bytes,
    pub modified: SystemTime,
    /// `true` if the generator ran for this request
    pub generated: bool,
}

type LockTable = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

/// Claim on a lock table entry. Dropping it removes the entry once no other
/// request holds or waits on it, including when the request is cancelled.
struct PathLock<'a> {
    locks: &'a LockTable,
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for PathLock<'_> {
    fn drop(&mut self) {
        let mut table = match self.locks.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        // One reference in the table plus ours
        if Arc::strong_count(&self.lock) <= 2 {
            table.remove(&self.path);
        }
    }
}

/// Disk cache of derived images rooted at a cache directory.
pub struct DerivedImageCache {
    root: PathBuf,
    locks: LockTable,
}

impl DerivedImageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of paths currently locked or waited on.
    pub fn in_flight(&self) -> usize {
        self.locks.lock().map(|table| table.len()).unwrap_or(0)
    }

    fn acquire(&self, path: &Path) -> PathLock<'_> {
        let mut table = match self.locks.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        let lock = table.entry(path.to_path_buf()).or_default().clone();
        PathLock {
            locks: &self.locks,
            path: path.to_path_buf(),
            lock,
        }
    }

    /// Serve the artifact at `path`, generating it first if it is missing or
    /// not fresh.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute artifact path, usually from [`super::path`]
    /// * `freshness` - Which existing files may be served
    /// * `generate` - Produces the encoded image on a miss
    ///
    /// # Errors
    ///
    /// - [`ArtifactError::DirectoryCreate`] if the parent cannot be created
    /// - [`ArtifactError::Generate`] if the generator fails; nothing is written
    /// - [`ArtifactError::ImageWrite`] / [`ArtifactError::Read`] on I/O failure
    pub async fn get<G, Fut>(
        &self,
        path: &Path,
        freshness: Freshness,
        generate: G,
    ) -> Result<Artifact, ArtifactError>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, RenderError>>,
    {
        let entry = self.acquire(path);
        let _guard = entry.lock.lock().await;
        self.get_locked(path, freshness, generate).await
    }

    async fn get_locked<G, Fut>(
        &self,
        path: &Path,
        freshness: Freshness,
        generate: G,
    ) -> Result<Artifact, ArtifactError>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, RenderError>>,
    {
        if let Some(modified) = storage::modified(path).await {
            if freshness.accepts(modified) {
                if let Some(data) = storage::read_optional(path).await? {
                    debug!(path = %path.display(), "artifact cache hit");
                    return Ok(Artifact {
                        path: path.to_path_buf(),
                        data: Bytes::from(data),
                        modified,
                        generated: false,
                    });
                }
            }
        }

        storage::ensure_parent(path).await?;
        let data = generate().await?;
        storage::write_atomic(path, &data).await?;
        info!(path = %path.display(), bytes = data.len(), "artifact generated");

        let modified = storage::modified(path)
            .await
            .unwrap_or_else(SystemTime::now);

        Ok(Artifact {
            path: path.to_path_buf(),
            data,
            modified,
            generated: true,
        })
    }

    /// Write and remove a probe file to prove the cache root is writable.
    pub async fn check_writable(&self) -> Result<(), ArtifactError> {
        let probe = self.root.join(".imagepack-probe");
        storage::ensure_parent(&probe).await?;
        storage::write_atomic(&probe, b"probe").await?;
        tokio::fs::remove_file(&probe)
            .await
            .map_err(|source| ArtifactError::ImageWrite {
                path: probe.clone(),
                source,
            })
    }

    /// Serve `path` only if it already exists; never generates.
    pub async fn existing(&self, path: &Path) -> Result<Option<Artifact>, ArtifactError> {
        let Some(modified) = storage::modified(path).await else {
            return Ok(None);
        };
        Ok(storage::read_optional(path).await?.map(|data| Artifact {
            path: path.to_path_buf(),
            data: Bytes::from(data),
            modified,
            generated: false,
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================
