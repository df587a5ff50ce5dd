//! Artifact encoding and source decoding.
//!
//! Every derived image is encoded in one of three formats. JPEG is
//! progressive and honours a quality setting; PNG and WebP are lossless.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader};
use jpeg_encoder::{ColorType, Encoder as JpegEncoder};

use crate::error::RenderError;

/// Default JPEG quality (1-100), shared by every image kind.
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Artifact Format
// =============================================================================

/// Output format of a derived image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    Jpeg,
    Png,
    Webp,
}

impl ArtifactFormat {
    /// Parse a file extension. `jpg` is an alias of `jpeg`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Canonical extension, used in cache paths.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Encode `image` in this format.
    ///
    /// # Arguments
    ///
    /// * `image` - Pixels to encode; alpha is dropped for JPEG
    /// * `quality` - JPEG quality, clamped to 1-100; ignored otherwise
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Encode`] if the codec rejects the image.
    pub fn encode(self, image: &DynamicImage, quality: u8) -> Result<Bytes, RenderError> {
        let mut output = Vec::new();
        let encode_err = |e: image::ImageError| RenderError::Encode(e.to_string());

        match self {
            Self::Jpeg => {
                let rgb = image.to_rgb8();
                let (width, height) = jpeg_dimensions(rgb.width(), rgb.height())?;
                let mut encoder = JpegEncoder::new(&mut output, clamp_quality(quality));
                encoder.set_progressive(true);
                encoder
                    .encode(rgb.as_raw(), width, height, ColorType::Rgb)
                    .map_err(|e| RenderError::Encode(e.to_string()))?;
            }
            Self::Png => {
                let rgba = image.to_rgba8();
                PngEncoder::new(&mut output)
                    .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
                    .map_err(encode_err)?;
            }
            Self::Webp => {
                let rgba = image.to_rgba8();
                WebPEncoder::new_lossless(&mut output)
                    .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
                    .map_err(encode_err)?;
            }
        }

        Ok(Bytes::from(output))
    }
}

/// JPEG frame headers store each dimension in 16 bits.
fn jpeg_dimensions(width: u32, height: u32) -> Result<(u16, u16), RenderError> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(RenderError::Encode(format!(
            "{width}x{height} exceeds the JPEG size limit"
        ))),
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| s.to_string())
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode an image of any supported format, guessing from its signature.
pub fn decode(source: &[u8]) -> Result<DynamicImage, RenderError> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| RenderError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| RenderError::Decode(e.to_string()))
}

/// Image dimensions without a full decode.
pub fn dimensions(source: &[u8]) -> Result<(u32, u32), RenderError> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| RenderError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| RenderError::Decode(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(8, 6, |x, y| {
            Rgba([(x * 32) as u8, (y * 40) as u8, 128, 200])
        }))
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(ArtifactFormat::from_extension("jpg"), Some(ArtifactFormat::Jpeg));
        assert_eq!(ArtifactFormat::from_extension("jpeg"), Some(ArtifactFormat::Jpeg));
        assert_eq!(ArtifactFormat::from_extension("webp"), Some(ArtifactFormat::Webp));
        assert_eq!(ArtifactFormat::from_extension("gif"), None);
        assert_eq!(ArtifactFormat::from_extension("PNG"), None);
        assert_eq!("png".parse::<ArtifactFormat>(), Ok(ArtifactFormat::Png));
    }

    /// Segment markers before the first scan.
    fn header_markers(data: &[u8]) -> Vec<u8> {
        let mut markers = Vec::new();
        let mut offset = 2;
        while offset + 4 <= data.len() && data[offset] == 0xFF {
            let marker = data[offset + 1];
            markers.push(marker);
            if marker == 0xDA {
                break;
            }
            let length = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 2 + length;
        }
        markers
    }

    #[test]
    fn test_jpeg_output_markers() {
        let output = ArtifactFormat::Jpeg.encode(&test_image(), 70).unwrap();

        assert_eq!(&output[..2], &[0xFF, 0xD8]);
        assert_eq!(&output[output.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!(dimensions(&output).unwrap(), (8, 6));
    }

    #[test]
    fn test_jpeg_is_progressive() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 48, |x, y| {
            Rgba([(x * 4) as u8, (y * 5) as u8, 90, 255])
        }));
        let output = ArtifactFormat::Jpeg.encode(&image, 70).unwrap();

        // SOF2 frame, no baseline SOF0
        let markers = header_markers(&output);
        assert!(markers.contains(&0xC2), "{markers:x?}");
        assert!(!markers.contains(&0xC0));
        assert_eq!(decode(&output).unwrap().dimensions(), (64, 48));
    }

    #[test]
    fn test_jpeg_dimension_limit() {
        assert_eq!(jpeg_dimensions(640, 480).unwrap(), (640, 480));
        assert!(matches!(jpeg_dimensions(70_000, 10), Err(RenderError::Encode(_))));
    }

    #[test]
    fn test_png_is_lossless() {
        let image = test_image();
        let output = ArtifactFormat::Png.encode(&image, 0).unwrap();

        let decoded = decode(&output).unwrap();
        assert_eq!(decoded.to_rgba8(), image.to_rgba8());
    }

    #[test]
    fn test_webp_round_trip_dimensions() {
        let output = ArtifactFormat::Webp.encode(&test_image(), 80).unwrap();
        assert_eq!(&output[..4], b"RIFF");
        assert_eq!(dimensions(&output).unwrap(), (8, 6));
    }

    #[test]
    fn test_quality_clamping() {
        assert_eq!(clamp_quality(0), 1);
        assert_eq!(clamp_quality(50), 50);
        assert_eq!(clamp_quality(255), 100);
        assert!(ArtifactFormat::Jpeg.encode(&test_image(), 0).is_ok());
        assert!(ArtifactFormat::Jpeg.encode(&test_image(), 255).is_ok());
    }

    #[test]
    fn test_decode_invalid_data() {
        assert!(matches!(decode(&[0, 1, 2, 3]), Err(RenderError::Decode(_))));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(ArtifactFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ArtifactFormat::Webp.to_string(), "webp");
    }
}
