//! Slippy-map tile acquisition.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              MapCompositor              │
//! └────────────────────┬────────────────────┘
//!                      │ get_tile(server, z, x, y)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileCache                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ memory LRU   │→ │ <cache>/tile/.. │  │
//! │  └──────────────┘  └────────┬────────┘  │
//! └─────────────────────────────┼───────────┘
//!                               │ miss
//!                               ▼
//! ┌─────────────────────────────────────────┐
//! │      TileFetcher (HttpTileFetcher)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! - [`TileServer`]: named URL template with `{Z}`, `{X}`, `{Y}` placeholders
//! - [`TileFetcher`]: network seam, implemented by [`HttpTileFetcher`]
//! - [`TileCache`]: read-through cache, memory then disk then fetch
//! - [`TileMemoryCache`]: size-bounded LRU of encoded tiles

mod cache;
mod fetcher;
mod server;

pub use cache::{TileCache, TileKey, TileMemoryCache, DEFAULT_TILE_MEMORY_CAPACITY};
pub use fetcher::{
    default_user_agent, FetchConfig, HttpTileFetcher, TileFetcher, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_REDIRECTS, ENV_AGENT, ENV_REDIRECT, ENV_TIMEOUT,
};
pub use server::{TileServer, CYCLE_TEMPLATE, OSM_TEMPLATE, TRANSPORT_TEMPLATE};
