//! Web Mercator tile math.
//!
//! Converts between geographic coordinates and fractional slippy-map tile
//! coordinates, formats sexagesimal degrees, and picks a zoom level that
//! keeps a set of coordinates on a canvas.
//!
//! Inputs are not range-checked: out-of-range latitudes or longitudes give
//! mathematically defined but geographically meaningless results.

mod coordinate;

pub use coordinate::{Coordinate, CoordinateList};

use std::f64::consts::PI;

/// Edge length of a slippy-map tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom level accepted by the tile servers.
pub const MAX_ZOOM: u8 = 19;

/// Number of tiles along one axis at `zoom`.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> f64 {
    2.0_f64.powi(zoom as i32)
}

/// Fractional tile x for a longitude.
#[inline]
pub fn longitude_to_tile_x(longitude: f64, zoom: u8) -> f64 {
    (longitude + 180.0) / 360.0 * tiles_per_axis(zoom)
}

/// Fractional tile y for a latitude.
///
/// `ln(tan φ + sec φ)` is `asinh(tan φ)`.
#[inline]
pub fn latitude_to_tile_y(latitude: f64, zoom: u8) -> f64 {
    let lat_rad = latitude.to_radians();
    (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * tiles_per_axis(zoom)
}

/// Longitude of a fractional tile x.
#[inline]
pub fn tile_x_to_longitude(x: f64, zoom: u8) -> f64 {
    x / tiles_per_axis(zoom) * 360.0 - 180.0
}

/// Latitude of a fractional tile y.
#[inline]
pub fn tile_y_to_latitude(y: f64, zoom: u8) -> f64 {
    (PI * (1.0 - 2.0 * y / tiles_per_axis(zoom)))
        .sinh()
        .atan()
        .to_degrees()
}

// =============================================================================
// Sexagesimal
// =============================================================================

/// Which hemisphere letters apply to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// N / S
    Latitude,
    /// E / W
    Longitude,
}

/// Format decimal degrees as `D°M'S"` followed by a hemisphere letter.
///
/// Each component is rounded before the modulo, as the cache files have
/// always been tagged. Values near a 60-unit boundary therefore round up into
/// the next unit, with a negative remainder.
pub fn to_sexagesimal(value: f64, axis: Axis) -> String {
    let degree = value.round() as i64 % 60;
    let minute = ((value - degree as f64) * 60.0).round() as i64 % 60;
    let second = ((value - degree as f64 - minute as f64 / 60.0) * 3600.0).round() as i64 % 3600;

    let hemisphere = match (axis, value >= 0.0) {
        (Axis::Latitude, true) => 'N',
        (Axis::Latitude, false) => 'S',
        (Axis::Longitude, true) => 'E',
        (Axis::Longitude, false) => 'W',
    };

    format!("{degree}°{minute}'{second}\"{hemisphere}")
}

/// Sexagesimal latitude.
pub fn latitude_to_sexagesimal(latitude: f64) -> String {
    to_sexagesimal(latitude, Axis::Latitude)
}

/// Sexagesimal longitude.
pub fn longitude_to_sexagesimal(longitude: f64) -> String {
    to_sexagesimal(longitude, Axis::Longitude)
}

// =============================================================================
// Zoom Fitting
// =============================================================================

/// Largest zoom in `1..=max_zoom` at which every coordinate falls strictly
/// inside a `width`×`height` canvas centred on `center`.
///
/// Returns 0 when no zoom from `max_zoom` down to 1 fits.
pub fn fit_zoom(
    center: Coordinate,
    coordinates: &[Coordinate],
    width: u32,
    height: u32,
    max_zoom: u8,
    tile_size: u32,
) -> u8 {
    let half_w = width as f64 / 2.0 / tile_size as f64;
    let half_h = height as f64 / 2.0 / tile_size as f64;

    (1..=max_zoom)
        .rev()
        .find(|&zoom| {
            let cx = longitude_to_tile_x(center.longitude, zoom);
            let cy = latitude_to_tile_y(center.latitude, zoom);
            let (start_x, end_x) = ((cx - half_w).floor(), (cx + half_w).ceil());
            let (start_y, end_y) = ((cy - half_h).floor(), (cy + half_h).ceil());

            coordinates.iter().all(|c| {
                let x = longitude_to_tile_x(c.longitude, zoom);
                let y = latitude_to_tile_y(c.latitude, zoom);
                start_x < x && x < end_x && start_y < y && y < end_y
            })
        })
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_world_tile_center() {
        assert_eq!(longitude_to_tile_x(0.0, 0), 0.5);
        assert!((latitude_to_tile_y(0.0, 0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_new_york_city_at_zoom_16() {
        let x = longitude_to_tile_x(-74.0060, 16);
        let y = latitude_to_tile_y(40.7128, 16);
        assert_eq!(x.floor() as u32, 19295);
        assert_eq!(y.floor() as u32, 24640);
    }

    #[test]
    fn test_world_edges() {
        assert_eq!(longitude_to_tile_x(-180.0, 3), 0.0);
        assert_eq!(longitude_to_tile_x(180.0, 3), 8.0);
        assert!((tile_y_to_latitude(0.0, 0) - 85.051_128_78).abs() < 1e-6);
    }

    #[test]
    fn test_longitude_round_trip() {
        for zoom in 0..=MAX_ZOOM {
            for lon in [-179.9, -74.006, 0.0, 2.3522, 139.6917, 179.9] {
                let back = tile_x_to_longitude(longitude_to_tile_x(lon, zoom), zoom);
                assert!((back - lon).abs() < 1e-9, "zoom {zoom} lon {lon} -> {back}");
            }
        }
    }

    #[test]
    fn test_latitude_round_trip() {
        for zoom in 0..=MAX_ZOOM {
            for lat in [-85.0, -33.8688, 0.0, 40.7128, 48.8566, 85.0] {
                let back = tile_y_to_latitude(latitude_to_tile_y(lat, zoom), zoom);
                assert!((back - lat).abs() < 1e-9, "zoom {zoom} lat {lat} -> {back}");
            }
        }
    }

    #[test]
    fn test_sexagesimal_hemispheres() {
        assert!(latitude_to_sexagesimal(10.25).ends_with('N'));
        assert!(latitude_to_sexagesimal(-10.25).ends_with('S'));
        assert!(longitude_to_sexagesimal(10.25).ends_with('E'));
        assert!(longitude_to_sexagesimal(-10.25).ends_with('W'));
    }

    #[test]
    fn test_sexagesimal_values() {
        assert_eq!(latitude_to_sexagesimal(10.25), "10°15'0\"N");
        assert_eq!(longitude_to_sexagesimal(0.0), "0°0'0\"E");
    }

    #[test]
    fn test_sexagesimal_rounds_before_modulo() {
        // 48.8566 rounds up to 49 degrees, leaving a negative minute part
        assert_eq!(latitude_to_sexagesimal(48.8566), "49°-9'24\"N");
    }

    #[test]
    fn test_fit_zoom_single_point_keeps_max() {
        let paris = Coordinate::new(48.8566, 2.3522);
        assert_eq!(fit_zoom(paris, &[paris], 640, 640, 17, TILE_SIZE), 17);
    }

    #[test]
    fn test_fit_zoom_spread_points() {
        let a = Coordinate::new(48.8566, 2.3522);
        let b = Coordinate::new(45.7640, 4.8357);
        let center = Coordinate::new((a.latitude + b.latitude) / 2.0, (a.longitude + b.longitude) / 2.0);
        let zoom = fit_zoom(center, &[a, b], 640, 640, 17, TILE_SIZE);
        assert!(zoom > 0 && zoom < 10, "zoom {zoom}");

        // Both points sit inside the canvas at the chosen zoom
        for c in [a, b] {
            let dx = (longitude_to_tile_x(c.longitude, zoom) - longitude_to_tile_x(center.longitude, zoom)).abs();
            assert!(dx * TILE_SIZE as f64 <= 640.0);
        }

        // And one zoom further in does not fit
        assert_eq!(fit_zoom(center, &[a, b], 640, 640, zoom + 1, TILE_SIZE), zoom);
    }

    #[test]
    fn test_fit_zoom_none_fits() {
        // The antimeridian sits on the canvas edge at every zoom
        let a = Coordinate::new(0.0, -180.0);
        let b = Coordinate::new(0.0, 179.0);
        let center = Coordinate::new(0.0, 0.0);
        assert_eq!(fit_zoom(center, &[a, b], 16, 16, 10, TILE_SIZE), 0);
    }
}
