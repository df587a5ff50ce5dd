//! Crop-resized thumbnails.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::RenderError;

/// Open and decode a source image from disk.
pub fn open_source(path: &Path) -> Result<DynamicImage, RenderError> {
    image::open(path).map_err(|e| RenderError::Source(format!("{}: {e}", path.display())))
}

/// Scale `source` to cover `width`×`height`, then crop the overflow evenly
/// from both sides.
pub fn crop_thumbnail(source: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    source.resize_to_fill(width, height, FilterType::Lanczos3)
}
