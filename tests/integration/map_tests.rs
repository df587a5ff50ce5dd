//! Map composition and tile caching tests.
//!
//! Tests verify:
//! - A repeated map request fetches its tiles once
//! - Tiles persist on disk and are reused by other maps
//! - A tile failure aborts composition without writing an artifact
//! - Grid and marker limits

use std::sync::Arc;

use imagepack::error::{ArtifactError, ImageError, RenderError, TileError};
use imagepack::geo::Coordinate;
use imagepack::map::{MapCompositor, MapLimits, MapRequest};
use imagepack::tile::{TileCache, TileServer};
use imagepack::ArtifactFormat;

use super::test_utils::{count_files, dimensions, is_jpeg, CountingFetcher, TestContext};

// =============================================================================
// Tile Fetch Accounting
// =============================================================================

#[tokio::test]
async fn test_repeated_map_fetches_tiles_once() {
    let ctx = TestContext::new();
    let service = ctx.service();

    let map = service
        .map(48.8566, 2.3522, Some(640), Some(640), Some(12))
        .unwrap();

    let first = service
        .map_image(&map.hash, 48.8566, 2.3522, 640, 640, 12, "jpeg")
        .await
        .unwrap();
    assert!(first.generated);
    assert!(is_jpeg(&first.data));
    assert_eq!(dimensions(&first.data), (640, 640));

    let fetched = ctx.fetcher.count();
    assert!(fetched >= 9, "640px needs at least 3x3 tiles, got {fetched}");
    assert_eq!(
        count_files(&ctx.cache_dir().join("tile/osm")),
        fetched,
        "every fetched tile is stored once"
    );

    let second = service
        .map_image(&map.hash, 48.8566, 2.3522, 640, 640, 12, "jpeg")
        .await
        .unwrap();
    assert!(!second.generated);
    assert_eq!(second.data, first.data);
    assert_eq!(ctx.fetcher.count(), fetched);
}

#[tokio::test]
async fn test_tiles_survive_a_fresh_service() {
    let ctx = TestContext::new();
    let map = ctx
        .service()
        .map(48.8566, 2.3522, Some(300), Some(300), Some(12))
        .unwrap();

    ctx.service()
        .map_image(&map.hash, 48.8566, 2.3522, 300, 300, 12, "png")
        .await
        .unwrap();
    let fetched = ctx.fetcher.count();

    // Same tiles, different artifact: composed again from disk tiles
    let served = ctx
        .service()
        .map_image(&map.hash, 48.8566, 2.3522, 300, 300, 12, "webp")
        .await
        .unwrap();
    assert!(served.generated);
    assert_eq!(ctx.fetcher.count(), fetched);
}

#[tokio::test]
async fn test_tile_urls_follow_template() {
    let ctx = TestContext::new();
    let service = ctx.service();
    let map = service.map(0.0, 0.0, Some(256), Some(256), Some(1)).unwrap();

    service
        .map_image(&map.hash, 0.0, 0.0, 256, 256, 1, "png")
        .await
        .unwrap();

    let urls = ctx.fetcher.urls();
    assert!(!urls.is_empty());
    for url in &urls {
        assert!(url.starts_with("https://tile.openstreetmap.org/1/"), "{url}");
        assert!(url.ends_with(".png"));
    }
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_tile_failure_aborts_map() {
    let ctx = TestContext::with_fetcher(CountingFetcher::failing(503));
    let service = ctx.service();
    let map = service.map(10.0, 20.0, Some(200), Some(200), Some(5)).unwrap();

    let err = service
        .map_image(&map.hash, 10.0, 20.0, 200, 200, 5, "jpeg")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ImageError::Artifact(ArtifactError::Generate(RenderError::Tile(TileError::Status {
            status: 503,
            ..
        })))
    ));

    assert_eq!(count_files(&ctx.cache_dir().join("map")), 0);
    assert_eq!(count_files(&ctx.cache_dir().join("tile")), 0);
}

#[tokio::test]
async fn test_map_limits() {
    let ctx = TestContext::new();
    let tiles = Arc::new(TileCache::new(
        ctx.cache_dir().join("tile"),
        ctx.fetcher.clone(),
    ));
    let compositor = MapCompositor::new(tiles, TileServer::osm()).with_limits(MapLimits {
        max_tiles: 4,
        max_markers: 1,
        max_dimension: 1024,
    });
    let style = ctx.config.map_marker;
    let center = Coordinate::new(45.0, 5.0);

    let request = MapRequest::single(center, 10, 1024, 1024, ArtifactFormat::Png, style);
    assert!(matches!(
        compositor.compose(&request).await,
        Err(RenderError::TooManyTiles { max: 4, .. })
    ));

    let request = MapRequest::single(center, 10, 2048, 100, ArtifactFormat::Png, style);
    assert!(matches!(
        compositor.compose(&request).await,
        Err(RenderError::InvalidDimensions { .. })
    ));

    let list = imagepack::CoordinateList::parse("45,5-46,6").unwrap();
    let request = MapRequest::multi(&list, 10, 100, 100, ArtifactFormat::Png, style, style);
    assert!(matches!(
        compositor.compose(&request).await,
        Err(RenderError::TooManyMarkers { count: 2, max: 1 })
    ));

    assert_eq!(ctx.fetcher.count(), 0, "limits are checked before fetching");
}

// =============================================================================
// Multi-marker Maps
// =============================================================================

#[tokio::test]
async fn test_multi_map_fits_all_markers() {
    let ctx = TestContext::new();
    let service = ctx.service();
    let coordinates = [
        Coordinate::new(48.85, 2.35),
        Coordinate::new(48.86, 2.36),
        Coordinate::new(48.87, 2.30),
    ];

    let multi = service
        .multi(&coordinates, Some(400), Some(400), Some(17))
        .unwrap();
    assert!(multi.zoom < 17, "markers 5km apart do not fit at zoom 17");
    assert_eq!(multi.coordinate, "48.85,2.35-48.86,2.36-48.87,2.3");

    let served = service
        .multi_image(&multi.hash, &multi.coordinate, 400, 400, multi.zoom, "png")
        .await
        .unwrap();
    assert_eq!(dimensions(&served.data), (400, 400));
    let (latitude, longitude) = served.gps.clone().unwrap();
    assert!(latitude.ends_with('N'), "{latitude}");
    assert!(longitude.ends_with('E'), "{longitude}");

    // Tampered zoom does not verify
    assert!(matches!(
        service
            .multi_image(&multi.hash, &multi.coordinate, 400, 400, multi.zoom + 1, "png")
            .await,
        Err(ImageError::HashMismatch { .. })
    ));
}
