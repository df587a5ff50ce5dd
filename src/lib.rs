//! # imagepack
//!
//! Generated images served from a disk cache and addressed by tokens only
//! this server can mint.
//!
//! ## Features
//!
//! - **Captchas**: arithmetic equations drawn as rotated glyphs
//! - **Static maps**: slippy-map tiles composed around one or many markers
//! - **Thumbnails**: centre-cropped resizes of local images
//! - **Link previews**: text over a cropped background for og:image
//! - **Reversible tokens**: keyed shift codec plus base64url/HMAC hashes
//!
//! ## Architecture
//!
//! - [`codec`] - Alphabet, reversible slug codec and keyed hashes
//! - [`geo`] - Web-Mercator tile math and coordinate formatting
//! - [`tile`] - Tile servers, fetching and the tile cache
//! - [`map`] - Tile grid layout, markers and composition
//! - [`render`] - Drawing primitives, encoders and per-kind renderers
//! - [`artifact`] - Cache paths and the read-through derived image cache
//! - [`service`] - Descriptors and served images per kind
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use imagepack::{
//!     create_router, FetchConfig, HttpTileFetcher, ImageConfig, ImageService, RouterConfig,
//!     Slugger, TileCache, TileServer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = HttpTileFetcher::new(FetchConfig::default())?;
//!     let tiles = Arc::new(TileCache::new("./cache/tile", fetcher));
//!     let service = ImageService::new(
//!         Slugger::new("secret")?,
//!         "./cache",
//!         tiles,
//!         TileServer::osm(),
//!         ImageConfig::default(),
//!     );
//!
//!     let router = create_router(service, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod codec;
pub mod config;
pub mod error;
pub mod geo;
pub mod map;
pub mod render;
pub mod server;
pub mod service;
mod storage;
pub mod tile;

// Re-export commonly used types
pub use artifact::{Artifact, DerivedImageCache, Freshness};
pub use codec::{slug, Alphabet, Slugger};
pub use config::{CheckConfig, Cli, Command, ServeConfig, SignConfig, SignKind, SignOutputFormat};
pub use error::{ArtifactError, CodecError, ImageError, RenderError, TileError};
pub use geo::{Coordinate, CoordinateList};
pub use map::{MapCompositor, MapLimits, MapRequest, Marker, MarkerStyle, TileGrid};
pub use render::{ArtifactFormat, Painter};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use service::{
    CaptchaChallenge, FacebookImage, FacebookRequest, ImageConfig, ImageService, MapDescriptor,
    MultiDescriptor, ServedImage, ThumbDescriptor,
};
pub use tile::{
    FetchConfig, HttpTileFetcher, TileCache, TileFetcher, TileMemoryCache, TileServer,
};
