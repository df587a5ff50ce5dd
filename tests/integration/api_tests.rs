//! HTTP API integration tests.
//!
//! Tests verify:
//! - Every image route serves the right content type and size
//! - Caching headers and conditional requests
//! - Error cases (tampered hash, unsupported format, bad filename, tile failure)

use axum::http::{header, StatusCode};
use image::Rgb;

use imagepack::geo::Coordinate;
use imagepack::render::FacebookText;
use imagepack::server::etag;
use imagepack::{ErrorResponse, FacebookRequest};

use super::test_utils::{
    body_bytes, body_json, dimensions, get, get_with, is_jpeg, is_png, is_webp, CountingFetcher,
    TestContext,
};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new();
    let response = get(&ctx.router(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Image Routes
// =============================================================================

#[tokio::test]
async fn test_map_route() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let map = ctx
        .service()
        .map(48.8566, 2.3522, Some(320), Some(480), Some(12))
        .unwrap();
    assert_eq!(
        map.src,
        format!("/map/{}/48.8566/2.3522/12/320/480.jpeg", map.hash)
    );

    let response = get(&router, &map.src).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers[header::ETAG], etag(&map.hash).as_str());
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(headers["x-robots-tag"], "noindex");
    assert_eq!(
        headers["x-gps-latitude"].as_bytes(),
        "49°-9'24\"N".as_bytes()
    );
    assert!(headers.contains_key("x-gps-longitude"));
    assert!(headers.contains_key(header::LAST_MODIFIED));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "inline; filename=\"map-48.8566,2.3522-12-480x320.jpeg\""
    );

    let body = body_bytes(response).await;
    assert!(is_jpeg(&body));
    assert_eq!(dimensions(&body), (480, 320));
}

#[tokio::test]
async fn test_map_route_negative_coordinates() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let map = ctx
        .service()
        .map(-33.8688, -151.2093, Some(200), Some(200), Some(10))
        .unwrap();

    let response = get(&router, &map.src.replace(".jpeg", ".png")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert!(is_png(&body_bytes(response).await));
}

#[tokio::test]
async fn test_multi_route() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let coordinates = [Coordinate::new(10.0, 20.0), Coordinate::new(10.01, 20.01)];
    let multi = ctx
        .service()
        .multi(&coordinates, Some(300), Some(300), None)
        .unwrap();

    let response = get(&router, &multi.src.replace(".jpeg", ".webp")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(response.headers()["x-robots-tag"], "noindex");

    let body = body_bytes(response).await;
    assert!(is_webp(&body));
    assert_eq!(dimensions(&body), (300, 300));
}

#[tokio::test]
async fn test_captcha_route() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let service = ctx.service();
    let captcha = service.captcha(None, None).unwrap();

    let response = get(&router, &captcha.src).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert!(!response.headers().contains_key("x-robots-tag"));

    let body = body_bytes(response).await;
    assert_eq!(dimensions(&body), (192, 52));

    assert!(service.verify_captcha(&captcha.token, &captcha.value).unwrap());
    assert!(!service.verify_captcha(&captcha.token, "-1").unwrap());
}

#[tokio::test]
async fn test_thumb_route() {
    let ctx = TestContext::new();
    ctx.write_source("photos/cat.png", 400, 300, Rgb([200, 100, 50]));
    let router = ctx.router();
    let thumb = ctx
        .service()
        .thumb("photos/cat.png", Some(100), Some(100))
        .unwrap();

    let response = get(&router, &thumb.src).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dimensions(&body_bytes(response).await), (100, 100));
}

#[tokio::test]
async fn test_facebook_route() {
    let mut ctx = TestContext::new();
    let background = ctx.write_source("og.png", 600, 400, Rgb([10, 20, 30]));
    ctx.config.facebook_source = Some(background);
    let router = ctx.router();

    let unknown = {
        let service = ctx.service();
        let short = service.slugger().short("/blog").unwrap();
        let hash = service.slugger().serialize(&(&short, 630u32, 1200u32)).unwrap();
        format!("/facebook/{hash}/{short}/630/1200.jpeg")
    };
    // Never generated
    assert_eq!(get(&router, &unknown).await.status(), StatusCode::NOT_FOUND);

    let request = FacebookRequest::new(
        "/blog",
        vec![FacebookText::new("My Blog: Crème Brûlée!")],
        std::time::SystemTime::now(),
    );
    let image = ctx.service().facebook(request).await.unwrap().unwrap();
    let (path, query) = image.image.split_once('?').unwrap();
    assert_eq!(path, unknown);
    assert!(query.starts_with("u="));

    let response = get(&router, &image.image).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dimensions(&body_bytes(response).await), (1200, 630));
}

// =============================================================================
// Conditional Requests
// =============================================================================

#[tokio::test]
async fn test_if_none_match_gives_304() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let map = ctx
        .service()
        .map(1.0, 2.0, Some(100), Some(100), Some(3))
        .unwrap();

    let response = get(&router, &map.src).await;
    let tag = response.headers()[header::ETAG].to_str().unwrap().to_string();
    let last_modified = response.headers()[header::LAST_MODIFIED]
        .to_str()
        .unwrap()
        .to_string();

    let response = get_with(&router, &map.src, &[("if-none-match", tag.as_str())]).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(body_bytes(response).await.is_empty());

    let response = get_with(&router, &map.src, &[("if-modified-since", last_modified.as_str())]).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let response = get_with(&router, &map.src, &[("if-none-match", "\"stale\"")]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_tampered_map_is_not_found() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let map = ctx
        .service()
        .map(48.8566, 2.3522, Some(100), Some(100), Some(12))
        .unwrap();

    let tampered = map.src.replace("/12/", "/13/");
    let response = get(&router, &tampered).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body.error, "hash_mismatch");
    assert_eq!(body.status, Some(404));
    assert_eq!(ctx.fetcher.count(), 0);
}

#[tokio::test]
async fn test_unsupported_format_is_not_found() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let captcha = ctx.service().captcha(None, None).unwrap();

    let response = get(&router, &captcha.src.replace(".jpeg", ".gif")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "unsupported_format");
}

#[tokio::test]
async fn test_malformed_filename_is_bad_request() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let captcha = ctx.service().captcha(None, None).unwrap();

    let response = get(&router, &captcha.src.replace("/192.jpeg", "/wide.jpeg")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_hash_is_not_found() {
    let ctx = TestContext::new();
    let response = get(&ctx.router(), "/thumb/abc/zzz/10/10.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "hash_mismatch");
}

#[tokio::test]
async fn test_tile_failure_is_bad_gateway() {
    let ctx = TestContext::with_fetcher(CountingFetcher::failing(500));
    let router = ctx.router();
    let map = ctx
        .service()
        .map(5.0, 5.0, Some(100), Some(100), Some(4))
        .unwrap();

    let response = get(&router, &map.src).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "tile_fetch_error");
}

#[tokio::test]
async fn test_missing_thumb_source_is_not_found() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let thumb = ctx.service().thumb("missing.png", None, None).unwrap();

    let response = get(&router, &thumb.src).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_non_finite_coordinate_is_bad_request() {
    let ctx = TestContext::new();
    let router = ctx.router();

    for src in ["/map/abc/NaN/2.5/3/100/100.png", "/map/abc/45/inf/3/100/100.png"] {
        let response = get(&router, src).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{src}");
        assert_eq!(body_json(response).await["error"], "invalid_parameter");
    }
    assert_eq!(ctx.fetcher.count(), 0);
}
