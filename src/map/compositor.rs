//! Static map composition.
//!
//! A map is built in three steps:
//!
//! 1. Every tile of the covering [`TileGrid`] is fetched through the
//!    [`TileCache`], on the async runtime.
//! 2. On a blocking thread, tiles are pasted onto a transparent canvas and
//!    markers are drawn over them.
//! 3. The canvas is encoded in the requested format.
//!
//! A single failed tile fails the whole map; nothing is partially rendered.

use std::sync::Arc;

use bytes::Bytes;
use image::{imageops, DynamicImage, RgbaImage};
use tracing::debug;

use super::grid::{destination, TileGrid};
use super::marker::{Marker, MarkerStyle};
use crate::error::RenderError;
use crate::geo::{
    latitude_to_sexagesimal, latitude_to_tile_y, longitude_to_sexagesimal, longitude_to_tile_x,
    tiles_per_axis, Coordinate, CoordinateList, TILE_SIZE,
};
use crate::render::{circle, decode, stamp, ArtifactFormat, Painter, TextStyle, TRANSPARENT};
use crate::tile::{TileCache, TileFetcher, TileServer};

/// Default maximum number of tiles in one map.
pub const DEFAULT_MAX_TILES: usize = 2048;

/// Default maximum number of markers in one map.
pub const DEFAULT_MAX_MARKERS: usize = 256;

/// Default maximum width or height of a map, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

// =============================================================================
// Limits
// =============================================================================

/// Upper bounds on the work one map request may cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapLimits {
    pub max_tiles: usize,
    pub max_markers: usize,
    pub max_dimension: u32,
}

impl Default for MapLimits {
    fn default() -> Self {
        Self {
            max_tiles: DEFAULT_MAX_TILES,
            max_markers: DEFAULT_MAX_MARKERS,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

// =============================================================================
// Request / Artifact
// =============================================================================

/// Parameters of one map image.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRequest {
    pub center: Coordinate,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
    pub format: ArtifactFormat,
    pub quality: u8,
    pub markers: Vec<Marker>,
}

impl MapRequest {
    /// A map with a single unlabelled marker at its centre.
    pub fn single(
        center: Coordinate,
        zoom: u8,
        width: u32,
        height: u32,
        format: ArtifactFormat,
        style: MarkerStyle,
    ) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
            format,
            quality: crate::render::DEFAULT_JPEG_QUALITY,
            markers: vec![Marker::new(center, style)],
        }
    }

    /// A map centred on the midpoint of `coordinates`, with one marker per
    /// coordinate labelled by its index.
    ///
    /// Markers sitting on the centre use `high`.
    pub fn multi(
        coordinates: &CoordinateList,
        zoom: u8,
        width: u32,
        height: u32,
        format: ArtifactFormat,
        style: MarkerStyle,
        high: MarkerStyle,
    ) -> Self {
        let center = coordinates.center();
        let center_key = center.micro_key();

        let markers = coordinates
            .coordinates()
            .iter()
            .enumerate()
            .map(|(index, c)| {
                let style = if c.micro_key() == center_key { high } else { style };
                Marker::new(*c, style).with_label(index.to_string())
            })
            .collect();

        Self {
            center,
            zoom,
            width,
            height,
            format,
            quality: crate::render::DEFAULT_JPEG_QUALITY,
            markers,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

/// An encoded map and the centre it depicts.
#[derive(Debug, Clone, PartialEq)]
pub struct MapArtifact {
    pub data: Bytes,
    /// Sexagesimal latitude of the centre
    pub gps_latitude: String,
    /// Sexagesimal longitude of the centre
    pub gps_longitude: String,
}

// =============================================================================
// Compositor
// =============================================================================

/// Composes tiles and markers into map images.
pub struct MapCompositor<F> {
    tiles: Arc<TileCache<F>>,
    server: TileServer,
    painter: Painter,
    limits: MapLimits,
}

impl<F: TileFetcher> MapCompositor<F> {
    pub fn new(tiles: Arc<TileCache<F>>, server: TileServer) -> Self {
        Self {
            tiles,
            server,
            painter: Painter::bitmap(),
            limits: MapLimits::default(),
        }
    }

    pub fn with_painter(mut self, painter: Painter) -> Self {
        self.painter = painter;
        self
    }

    pub fn with_limits(mut self, limits: MapLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn server(&self) -> &TileServer {
        &self.server
    }

    pub fn limits(&self) -> &MapLimits {
        &self.limits
    }

    pub fn tiles(&self) -> &TileCache<F> {
        &self.tiles
    }

    fn validate(&self, request: &MapRequest) -> Result<(), RenderError> {
        let max = self.limits.max_dimension;
        if !(1..=max).contains(&request.width) || !(1..=max).contains(&request.height) {
            return Err(RenderError::InvalidDimensions {
                width: request.width,
                height: request.height,
                max,
            });
        }
        if request.markers.len() > self.limits.max_markers {
            return Err(RenderError::TooManyMarkers {
                count: request.markers.len(),
                max: self.limits.max_markers,
            });
        }
        Ok(())
    }

    /// Render `request`.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidDimensions`], [`RenderError::TooManyMarkers`]
    ///   or [`RenderError::TooManyTiles`] when a limit is exceeded
    /// - [`RenderError::Tile`] if any tile cannot be fetched
    /// - [`RenderError::Decode`] / [`RenderError::Encode`] on codec failure
    pub async fn compose(&self, request: &MapRequest) -> Result<MapArtifact, RenderError> {
        self.validate(request)?;

        let zoom = request.zoom;
        let center_x = longitude_to_tile_x(request.center.longitude, zoom);
        let center_y = latitude_to_tile_y(request.center.latitude, zoom);

        let grid = TileGrid::covering(center_x, center_y, request.width, request.height, TILE_SIZE);
        if grid.len() > self.limits.max_tiles {
            return Err(RenderError::TooManyTiles {
                count: grid.len(),
                max: self.limits.max_tiles,
            });
        }

        let world = tiles_per_axis(zoom) as i64;
        let mut placed = Vec::with_capacity(grid.len());

        for (x, y) in grid.iter() {
            // Above or below the world: left transparent
            if !(0..world).contains(&y) {
                continue;
            }
            let data = self
                .tiles
                .get_tile(&self.server, zoom, x.rem_euclid(world), y)
                .await?;
            placed.push((
                destination(request.width, TILE_SIZE, center_x, x),
                destination(request.height, TILE_SIZE, center_y, y),
                data,
            ));
        }

        debug!(
            zoom,
            tiles = placed.len(),
            markers = request.markers.len(),
            "composing map"
        );

        let painter = self.painter.clone();
        let center = request.center;
        let request = request.clone();

        let data = tokio::task::spawn_blocking(move || {
            let mut canvas = RgbaImage::from_pixel(request.width, request.height, TRANSPARENT);

            for (dest_x, dest_y, data) in &placed {
                let tile = decode(data)?.to_rgba8();
                imageops::overlay(&mut canvas, &tile, *dest_x, *dest_y);
            }

            for marker in &request.markers {
                draw_marker(&mut canvas, &painter, marker, (center_x, center_y), zoom)?;
            }

            request
                .format
                .encode(&DynamicImage::ImageRgba8(canvas), request.quality)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))??;

        Ok(MapArtifact {
            data,
            gps_latitude: latitude_to_sexagesimal(center.latitude),
            gps_longitude: longitude_to_sexagesimal(center.longitude),
        })
    }
}

/// Draw a marker circle and its label, centred on the marker's position.
fn draw_marker(
    canvas: &mut RgbaImage,
    painter: &Painter,
    marker: &Marker,
    center: (f64, f64),
    zoom: u8,
) -> Result<(), RenderError> {
    let (width, height) = canvas.dimensions();
    let style = &marker.style;

    let tile_x = longitude_to_tile_x(marker.coordinate.longitude, zoom);
    let tile_y = latitude_to_tile_y(marker.coordinate.latitude, zoom);
    let dest_x = (f64::from(width) / 2.0 - f64::from(TILE_SIZE) * (center.0 - tile_x)).floor() as i64;
    let dest_y = (f64::from(height) / 2.0 - f64::from(TILE_SIZE) * (center.1 - tile_y)).floor() as i64;

    // Far off-canvas markers cannot be drawn anyway
    let (Ok(px), Ok(py)) = (i32::try_from(dest_x), i32::try_from(dest_y)) else {
        return Ok(());
    };
    circle(
        canvas,
        (px, py),
        style.radius as i32,
        style.thickness as i32,
        style.fill,
        style.border,
    );

    if let Some(label) = &marker.label {
        let text = TextStyle {
            size: style.size,
            fill: style.border,
            stroke: style.border,
            thickness: (style.thickness / 4).min(u32::from(u8::MAX)) as u8,
        };
        let layer = painter.text_layer(label, &text)?;
        let anchor_x = dest_x - i64::from(style.radius);
        let anchor_y = dest_y + i64::from(style.thickness);
        stamp(
            canvas,
            &layer,
            anchor_x - i64::from(layer.width()) / 2,
            anchor_y - i64::from(layer.height()) / 2,
        );
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
