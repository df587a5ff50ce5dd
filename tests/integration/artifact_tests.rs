//! Derived image cache integration tests.
//!
//! Tests verify:
//! - Thumbnails are redrawn when their source changes, and only then
//! - Concurrent requests for one map generate it once
//! - Cache layout on disk

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use image::Rgb;

use imagepack::error::ImageError;

use super::test_utils::{count_files, dimensions, TestContext};

fn touch(path: &std::path::Path, modified: SystemTime) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(modified).unwrap();
}

#[tokio::test]
async fn test_thumb_follows_source_mtime() {
    let ctx = TestContext::new();
    let source = ctx.write_source("albums/2024/beach.png", 800, 400, Rgb([0, 0, 255]));
    touch(&source, SystemTime::now() - Duration::from_secs(3600));

    let service = ctx.service();
    let thumb = service.thumb("albums/2024/beach.png", Some(50), Some(80)).unwrap();

    let first = service
        .thumb_image(&thumb.hash, &thumb.short, 50, 80, "png")
        .await
        .unwrap();
    assert!(first.generated);
    assert_eq!(dimensions(&first.data), (80, 50));
    assert!(ctx
        .cache_dir()
        .join("thumb/albums/2024/beach.png.png")
        .is_file());

    let again = service
        .thumb_image(&thumb.hash, &thumb.short, 50, 80, "png")
        .await
        .unwrap();
    assert!(!again.generated);

    // A newer source invalidates the thumbnail
    ctx.write_source("albums/2024/beach.png", 800, 400, Rgb([255, 0, 0]));
    touch(&source, SystemTime::now() + Duration::from_secs(3600));

    let redrawn = service
        .thumb_image(&thumb.hash, &thumb.short, 50, 80, "png")
        .await
        .unwrap();
    assert!(redrawn.generated);
    let pixel = image::load_from_memory(&redrawn.data)
        .unwrap()
        .to_rgb8()
        .get_pixel(40, 25)
        .0;
    assert!(pixel[0] > 200 && pixel[2] < 50, "{pixel:?}");
}

#[tokio::test]
async fn test_thumb_rejects_escaping_paths() {
    let ctx = TestContext::new();
    let service = ctx.service();

    assert!(matches!(
        service.thumb("../secret.png", None, None),
        Err(ImageError::InvalidPath(_))
    ));

    // A valid hash over an escaping path is still refused
    let short = service.slugger().short("../../etc/passwd").unwrap();
    let hash = service.slugger().serialize(&(&short, 10u32, 10u32)).unwrap();
    assert!(matches!(
        service.thumb_image(&hash, &short, 10, 10, "png").await,
        Err(ImageError::InvalidPath(_))
    ));
}

#[tokio::test]
async fn test_concurrent_map_requests_generate_once() {
    let ctx = TestContext::new();
    let service = Arc::new(ctx.service());
    let map = service
        .map(51.5074, -0.1278, Some(256), Some(256), Some(14))
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        let hash = map.hash.clone();
        handles.push(tokio::spawn(async move {
            service
                .map_image(&hash, 51.5074, -0.1278, 256, 256, 14, "jpeg")
                .await
                .unwrap()
        }));
    }

    let mut generated = 0;
    let mut bodies = Vec::new();
    for handle in handles {
        let served = handle.await.unwrap();
        if served.generated {
            generated += 1;
        }
        bodies.push(served.data);
    }

    assert_eq!(generated, 1);
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        ctx.fetcher.count(),
        count_files(&ctx.cache_dir().join("tile")),
        "no tile fetched twice"
    );
    assert_eq!(count_files(&ctx.cache_dir().join("map")), 1);
    assert_eq!(service.artifacts().in_flight(), 0);
}

#[tokio::test]
async fn test_captcha_cached_within_ttl() {
    let ctx = TestContext::new();
    let service = ctx.service();
    let captcha = service.captcha(Some(40), Some(120)).unwrap();

    let first = service
        .captcha_image(&captcha.hash, &captcha.short, 40, 120, "png")
        .await
        .unwrap();
    let second = service
        .captcha_image(&captcha.hash, &captcha.short, 40, 120, "png")
        .await
        .unwrap();

    assert!(first.generated);
    assert!(!second.generated);
    assert_eq!(first.data, second.data);
    assert_eq!(dimensions(&second.data), (120, 40));
    assert_eq!(count_files(&ctx.cache_dir().join("captcha")), 1);
}
