//! Tile rectangle covering a canvas.

/// Inclusive rectangle of tile indices around a fractional centre.
///
/// The bounds use `floor(floor(c) - size/tile)` and `ceil(ceil(c) + size/tile)`,
/// which over-covers the canvas by at least one tile on every side so no edge
/// is ever left without a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub start_x: i64,
    pub start_y: i64,
    pub end_x: i64,
    pub end_y: i64,
}

impl TileGrid {
    /// Grid for a `width`×`height` canvas centred on tile coordinates
    /// `(center_x, center_y)`.
    pub fn covering(center_x: f64, center_y: f64, width: u32, height: u32, tile_size: u32) -> Self {
        let tz = f64::from(tile_size);
        let (w, h) = (f64::from(width), f64::from(height));

        Self {
            start_x: (center_x.floor() - w / tz).floor() as i64,
            start_y: (center_y.floor() - h / tz).floor() as i64,
            end_x: (center_x.ceil() + w / tz).ceil() as i64,
            end_y: (center_y.ceil() + h / tz).ceil() as i64,
        }
    }

    pub fn columns(&self) -> usize {
        (self.end_x - self.start_x + 1).max(0) as usize
    }

    pub fn rows(&self) -> usize {
        (self.end_y - self.start_y + 1).max(0) as usize
    }

    /// Number of tiles in the rectangle.
    pub fn len(&self) -> usize {
        self.columns().saturating_mul(self.rows())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tile indices in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (self.start_y..=self.end_y)
            .flat_map(move |y| (self.start_x..=self.end_x).map(move |x| (x, y)))
    }
}

/// Canvas offset of the tile at `index` along one axis.
///
/// `floor(size/2 - tile_size * (center - index))`
#[inline]
pub fn destination(size: u32, tile_size: u32, center: f64, index: i64) -> i64 {
    (f64::from(size) / 2.0 - f64::from(tile_size) * (center - index as f64)).floor() as i64
}
