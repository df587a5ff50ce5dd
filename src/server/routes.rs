//! Router configuration for imagepack.
//!
//! # Route Structure
//!
//! ```text
//! /health                                                   - Health check
//! /captcha/{hash}/{token}/{height}/{filename}               - CAPTCHA equation image
//! /thumb/{hash}/{token}/{height}/{filename}                 - Thumbnail
//! /facebook/{hash}/{token}/{height}/{filename}              - Facebook preview
//! /map/{hash}/{latitude}/{longitude}/{zoom}/{height}/{filename}
//! /multi/{hash}/{coordinate}/{zoom}/{height}/{filename}
//! ```
//!
//! `token` is the short token of the equation or source path and `filename`
//! is `{width}.{format}`. Every image route is protected by its integrity
//! hash, so no middleware authentication is layered on top.
//!
//! # Example
//!
//! ```ignore
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{CONTENT_TYPE, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    captcha_handler, facebook_handler, health_handler, map_handler, multi_handler,
    thumb_handler, AppState, DEFAULT_CACHE_MAX_AGE,
};
use crate::service::ImageService;
use crate::tile::TileFetcher;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// # Arguments
///
/// * `service` - The image service backing every image route
/// * `config` - Router configuration
pub fn create_router<F: TileFetcher>(service: ImageService<F>, config: RouterConfig) -> Router {
    let app_state = AppState::with_cache_max_age(service, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/captcha/{hash}/{token}/{height}/{filename}",
            get(captcha_handler::<F>),
        )
        .route(
            "/thumb/{hash}/{token}/{height}/{filename}",
            get(thumb_handler::<F>),
        )
        .route(
            "/facebook/{hash}/{token}/{height}/{filename}",
            get(facebook_handler::<F>),
        )
        .route(
            "/map/{hash}/{latitude}/{longitude}/{zoom}/{height}/{filename}",
            get(map_handler::<F>),
        )
        .route(
            "/multi/{hash}/{coordinate}/{zoom}/{height}/{filename}",
            get(multi_handler::<F>),
        )
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, IF_NONE_MATCH, IF_MODIFIED_SINCE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        // No origins allowed
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
