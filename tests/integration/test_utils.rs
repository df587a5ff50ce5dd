//! Test utilities for integration tests.
//!
//! Provides a counting in-memory tile fetcher and a context owning a
//! temporary cache and source directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use tower::ServiceExt;

use imagepack::error::TileError;
use imagepack::tile::{TileCache, TileFetcher, TileServer};
use imagepack::{create_router, ImageConfig, ImageService, RouterConfig, Slugger};

pub const TEST_SECRET: &str = "test";

// =============================================================================
// Counting Tile Fetcher
// =============================================================================

/// Serves a solid 256x256 PNG for every URL and records each request.
///
/// Clones share their counters.
#[derive(Clone)]
pub struct CountingFetcher {
    tile: Bytes,
    count: Arc<AtomicUsize>,
    urls: Arc<Mutex<Vec<String>>>,
    fail_status: Option<u16>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self {
            tile: tile_png(Rgb([170, 211, 223])),
            count: Arc::new(AtomicUsize::new(0)),
            urls: Arc::new(Mutex::new(Vec::new())),
            fail_status: None,
        }
    }

    /// A fetcher whose every request fails with `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new()
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl Default for CountingFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, TileError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        match self.fail_status {
            Some(status) => Err(TileError::Status {
                url: url.to_string(),
                status,
            }),
            None => Ok(self.tile.clone()),
        }
    }
}

/// Encode a solid tile as PNG.
pub fn tile_png(color: Rgb<u8>) -> Bytes {
    let tile = RgbImage::from_pixel(256, 256, color);
    let mut data = std::io::Cursor::new(Vec::new());
    tile.write_to(&mut data, ImageFormat::Png).unwrap();
    Bytes::from(data.into_inner())
}

// =============================================================================
// Test Context
// =============================================================================

/// Temporary cache and source directories plus the shared fetcher.
pub struct TestContext {
    pub dir: TempDir,
    pub fetcher: CountingFetcher,
    pub config: ImageConfig,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_fetcher(CountingFetcher::new())
    }

    pub fn with_fetcher(fetcher: CountingFetcher) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sources")).unwrap();
        let config = ImageConfig {
            source_root: dir.path().join("sources"),
            ..ImageConfig::default()
        };
        Self {
            dir,
            fetcher,
            config,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn source_root(&self) -> &Path {
        &self.config.source_root
    }

    /// A fresh service over the context's directories and fetcher.
    pub fn service(&self) -> ImageService<CountingFetcher> {
        let tiles = Arc::new(TileCache::new(
            self.cache_dir().join("tile"),
            self.fetcher.clone(),
        ));
        ImageService::new(
            Slugger::new(TEST_SECRET).unwrap(),
            self.cache_dir(),
            tiles,
            TileServer::osm(),
            self.config.clone(),
        )
    }

    pub fn router(&self) -> Router {
        create_router(self.service(), RouterConfig::new().with_tracing(false))
    }

    /// Write a solid RGB source image under the source root.
    pub fn write_source(&self, relative: &str, width: u32, height: u32, color: Rgb<u8>) -> PathBuf {
        let path = self.source_root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(width, height, color).save(&path).unwrap();
        path
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HTTP Helpers
// =============================================================================

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    get_with(router, uri, &[]).await
}

pub async fn get_with(router: &Router, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// =============================================================================
// Image Checks
// =============================================================================

pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() > 4 && data[0] == 0xFF && data[1] == 0xD8
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G'])
}

pub fn is_webp(data: &[u8]) -> bool {
    data.len() > 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// Decoded dimensions of an encoded image.
pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(data).unwrap();
    (image.width(), image.height())
}

/// Count regular files below `dir`, ignoring temp files.
pub fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else if path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(".tmp"))
            {
                0
            } else {
                1
            }
        })
        .sum()
}
