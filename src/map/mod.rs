//! Static map rendering from slippy-map tiles.
//!
//! - [`TileGrid`]: tile rectangle covering a canvas
//! - [`Marker`] / [`MarkerStyle`]: circles and index labels drawn over tiles
//! - [`MapCompositor`]: fetches tiles, composes, draws markers, encodes

mod compositor;
mod grid;
mod marker;

pub use compositor::{
    MapArtifact, MapCompositor, MapLimits, MapRequest, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_MARKERS,
    DEFAULT_MAX_TILES,
};
pub use grid::{destination, TileGrid};
pub use marker::{Marker, MarkerStyle};
