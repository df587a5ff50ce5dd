use image::Rgba;

use crate::geo::Coordinate;

/// Appearance of a map marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub fill: Rgba<u8>,
    pub border: Rgba<u8>,
    pub radius: u32,
    /// Circle outline width; labels are outlined with a quarter of it
    pub thickness: u32,
    /// Label glyph height
    pub size: f32,
}

/// A circle, optionally labelled, drawn at a geographic position.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub coordinate: Coordinate,
    pub style: MarkerStyle,
    pub label: Option<String>,
}

impl Marker {
    pub fn new(coordinate: Coordinate, style: MarkerStyle) -> Self {
        Self {
            coordinate,
            style,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
