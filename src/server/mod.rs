//! HTTP server layer for imagepack.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   GET /{captcha,thumb,facebook,map,multi}/{hash}/.../{w}.{fmt}  │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (headers, 304, errors)   │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                        ImageService
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    captcha_handler, error_status, etag, facebook_handler, health_handler, image_response,
    map_handler, multi_handler, parse_filename, thumb_handler, AppState, ErrorResponse,
    HealthResponse, MapPathParams, MultiPathParams, TokenPathParams, DEFAULT_CACHE_MAX_AGE,
};
pub use routes::{create_router, RouterConfig};
