//! Raster drawing primitives.
//!
//! Text is rendered to a coverage mask first, then coloured into a
//! transparent RGBA layer. The layer can be rotated, blurred or faded before
//! it is stamped onto a canvas with alpha blending.
//!
//! Glyphs come from a configured TrueType font when one is loaded. Without a
//! font, a built-in 5x7 bitmap face covers printable ASCII. Accented Latin
//! letters are drawn with their base letter; other scripts need a font.

use ab_glyph::{FontArc, PxScale};
use icu_normalizer::DecomposingNormalizerBorrowed;
use image::imageops;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::morphology::dilate;
use imageproc::rect::Rect;

use crate::error::RenderError;

/// Fully transparent pixel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// =============================================================================
// Colours
// =============================================================================

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `white`, `black` or `transparent`.
pub fn parse_color(text: &str) -> Option<Rgba<u8>> {
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "transparent" | "none" => return Some(TRANSPARENT),
        "white" => return Some(Rgba([255, 255, 255, 255])),
        "black" => return Some(Rgba([0, 0, 0, 255])),
        _ => {}
    }

    let hex = text.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba([nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17, 255])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// Parse a colour for a clap argument.
pub fn parse_color_arg(text: &str) -> Result<Rgba<u8>, String> {
    parse_color(text).ok_or_else(|| format!("invalid colour {text:?}"))
}

// =============================================================================
// Text Style
// =============================================================================

/// Horizontal anchoring of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

impl Align {
    /// Left edge of a run `width` pixels wide anchored at `x`.
    pub fn left_edge(self, x: i64, width: u32) -> i64 {
        match self {
            Self::Left => x,
            Self::Center => x - i64::from(width) / 2,
            Self::Right => x - i64::from(width),
        }
    }
}

/// How a text run is painted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Glyph height in pixels
    pub size: f32,
    pub fill: Rgba<u8>,
    pub stroke: Rgba<u8>,
    /// Outline width in pixels; 0 disables the outline
    pub thickness: u8,
}

// =============================================================================
// Painter
// =============================================================================

/// Glyph source for text rendering.
#[derive(Clone)]
enum Face {
    Bitmap,
    Truetype(FontArc),
}

/// Renders text runs into RGBA layers.
#[derive(Clone)]
pub struct Painter {
    face: Face,
}

impl std::fmt::Debug for Painter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let face = match self.face {
            Face::Bitmap => "bitmap",
            Face::Truetype(_) => "truetype",
        };
        f.debug_struct("Painter").field("face", &face).finish()
    }
}

impl Default for Painter {
    fn default() -> Self {
        Self::bitmap()
    }
}

impl Painter {
    /// Painter using the built-in bitmap face.
    pub fn bitmap() -> Self {
        Self { face: Face::Bitmap }
    }

    /// Painter using a TrueType or OpenType font.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Font`] if the bytes are not a usable font.
    pub fn from_font_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        let font = FontArc::try_from_vec(data).map_err(|e| RenderError::Font(e.to_string()))?;
        Ok(Self {
            face: Face::Truetype(font),
        })
    }

    pub fn has_font(&self) -> bool {
        matches!(self.face, Face::Truetype(_))
    }

    /// Whether every character of `text` can be drawn.
    pub fn supports(&self, text: &str) -> bool {
        match self.face {
            Face::Truetype(_) => true,
            Face::Bitmap => text.chars().all(|c| glyph(c).is_some()),
        }
    }

    /// Width and height of `text` at `size`, without outline.
    pub fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        match &self.face {
            Face::Truetype(font) => text_size(PxScale::from(size), font, text),
            Face::Bitmap => {
                let dot = dot_size(size);
                let chars = text.chars().count() as u32;
                let width = (chars * (GLYPH_WIDTH + 1) * dot).saturating_sub(dot);
                (width, GLYPH_HEIGHT * dot)
            }
        }
    }

    /// Coverage mask of `text`, with `pad` empty pixels on every side.
    fn mask(&self, text: &str, size: f32, pad: u32) -> Result<GrayImage, RenderError> {
        if !self.supports(text) {
            return Err(RenderError::FontMissing(text.to_string()));
        }

        let (width, height) = self.measure(text, size);
        let mut mask = GrayImage::new(width + 2 * pad, height + 2 * pad);

        match &self.face {
            Face::Truetype(font) => {
                draw_text_mut(
                    &mut mask,
                    Luma([255]),
                    pad as i32,
                    pad as i32,
                    PxScale::from(size),
                    font,
                    text,
                );
            }
            Face::Bitmap => {
                let dot = dot_size(size);
                for (index, c) in text.chars().enumerate() {
                    let Some(rows) = glyph(c) else { continue };
                    let origin_x = pad + index as u32 * (GLYPH_WIDTH + 1) * dot;
                    for (row, bits) in rows.iter().enumerate() {
                        for col in 0..GLYPH_WIDTH {
                            if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                                let x = origin_x + col * dot;
                                let y = pad + row as u32 * dot;
                                draw_filled_rect_mut(
                                    &mut mask,
                                    Rect::at(x as i32, y as i32).of_size(dot, dot),
                                    Luma([255]),
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(mask)
    }

    /// Render `text` into a tight transparent layer, outline under fill.
    ///
    /// The layer carries `style.thickness` pixels of margin on every side, so
    /// the glyph box starts at `(thickness, thickness)`.
    pub fn text_layer(&self, text: &str, style: &TextStyle) -> Result<RgbaImage, RenderError> {
        let pad = u32::from(style.thickness);
        let mask = self.mask(text, style.size, pad)?;

        let mut layer = if style.thickness > 0 {
            colorize(&dilate(&mask, Norm::L2, style.thickness), style.stroke)
        } else {
            RgbaImage::from_pixel(mask.width(), mask.height(), TRANSPARENT)
        };
        imageops::overlay(&mut layer, &colorize(&mask, style.fill), 0, 0);

        Ok(layer)
    }

    /// Render only the outline of `text`.
    pub fn stroke_layer(&self, text: &str, style: &TextStyle) -> Result<RgbaImage, RenderError> {
        let pad = u32::from(style.thickness);
        let mask = self.mask(text, style.size, pad)?;
        Ok(colorize(&dilate(&mask, Norm::L2, style.thickness), style.stroke))
    }

    /// Render only the fill of `text`, with the same margin as [`Self::stroke_layer`].
    pub fn fill_layer(&self, text: &str, style: &TextStyle) -> Result<RgbaImage, RenderError> {
        let mask = self.mask(text, style.size, u32::from(style.thickness))?;
        Ok(colorize(&mask, style.fill))
    }
}

// =============================================================================
// Layer Operations
// =============================================================================

/// Turn a coverage mask into a layer of `color`.
pub fn colorize(mask: &GrayImage, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        let coverage = u16::from(mask.get_pixel(x, y)[0]);
        let alpha = (u16::from(color[3]) * coverage / 255) as u8;
        Rgba([color[0], color[1], color[2], alpha])
    })
}

/// Alpha-blend `layer` onto `canvas` with its top-left corner at `(x, y)`.
pub fn stamp(canvas: &mut RgbaImage, layer: &RgbaImage, x: i64, y: i64) {
    imageops::overlay(canvas, layer, x, y);
}

/// Rotate a layer about its centre by `degrees`, growing it so no corner is
/// clipped. Positive angles turn clockwise.
pub fn rotate(layer: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees == 0.0 {
        return layer.clone();
    }
    let (w, h) = layer.dimensions();
    let side = (f64::from(w).hypot(f64::from(h))).ceil() as u32;

    let mut padded = RgbaImage::from_pixel(side, side, TRANSPARENT);
    imageops::overlay(
        &mut padded,
        layer,
        i64::from((side - w) / 2),
        i64::from((side - h) / 2),
    );

    rotate_about_center(&padded, degrees.to_radians(), Interpolation::Bilinear, TRANSPARENT)
}

/// Gaussian blur.
pub fn blur(layer: &RgbaImage, sigma: f32) -> RgbaImage {
    imageops::blur(layer, sigma)
}

/// Divide every pixel's alpha by `divisor`.
pub fn scale_alpha(layer: &mut RgbaImage, divisor: f32) {
    if divisor <= 0.0 {
        return;
    }
    for pixel in layer.pixels_mut() {
        pixel[3] = (f32::from(pixel[3]) / divisor).round() as u8;
    }
}

/// Draw a filled circle with an outline of `thickness` pixels centred on the
/// radius.
pub fn circle(
    canvas: &mut RgbaImage,
    center: (i32, i32),
    radius: i32,
    thickness: i32,
    fill: Rgba<u8>,
    border: Rgba<u8>,
) {
    if thickness > 0 {
        draw_filled_circle_mut(canvas, center, radius + thickness / 2, border);
        let inner = radius - (thickness + 1) / 2;
        if inner > 0 {
            draw_filled_circle_mut(canvas, center, inner, fill);
        }
    } else if radius > 0 {
        draw_filled_circle_mut(canvas, center, radius, fill);
    }
}

// =============================================================================
// Bitmap Face
// =============================================================================

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

fn dot_size(size: f32) -> u32 {
    ((size / GLYPH_HEIGHT as f32).round() as u32).max(1)
}

/// Glyph of `c`, drawing accented Latin letters with their base letter.
fn glyph(c: char) -> Option<[u8; 7]> {
    ascii_glyph(c).or_else(|| {
        let mut buf = [0u8; 4];
        let decomposed = DecomposingNormalizerBorrowed::new_nfd().normalize(c.encode_utf8(&mut buf));
        decomposed
            .chars()
            .next()
            .filter(|base| *base != c)
            .and_then(ascii_glyph)
    })
}

#[rustfmt::skip]
fn ascii_glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        ' ' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '"' => [0b01010, 0b01010, 0b01010, 0b00000, 0b00000, 0b00000, 0b00000],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '$' => [0b00100, 0b01111, 0b10100, 0b01110, 0b00101, 0b11110, 0b00100],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '\'' => [0b01100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '/' => [0b00000, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        ';' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b00100, 0b01000],
        '<' => [0b00010, 0b00100, 0b01000, 0b10000, 0b01000, 0b00100, 0b00010],
        '>' => [0b01000, 0b00100, 0b00010, 0b00001, 0b00010, 0b00100, 0b01000],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        '@' => [0b01110, 0b10001, 0b00001, 0b01101, 0b10101, 0b10101, 0b01110],
        '[' => [0b01110, 0b01000, 0b01000, 0b01000, 0b01000, 0b01000, 0b01110],
        '\\' => [0b00000, 0b10000, 0b01000, 0b00100, 0b00010, 0b00001, 0b00000],
        ']' => [0b01110, 0b00010, 0b00010, 0b00010, 0b00010, 0b00010, 0b01110],
        '^' => [0b00100, 0b01010, 0b10001, 0b00000, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '`' => [0b01000, 0b00100, 0b00010, 0b00000, 0b00000, 0b00000, 0b00000],
        '{' => [0b00010, 0b00100, 0b00100, 0b01000, 0b00100, 0b00100, 0b00010],
        '|' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        '}' => [0b01000, 0b00100, 0b00100, 0b00010, 0b00100, 0b00100, 0b01000],
        '~' => [0b00000, 0b00000, 0b01000, 0b10101, 0b00010, 0b00000, 0b00000],
        '*' => [0b00000, 0b00100, 0b10101, 0b01110, 0b10101, 0b00100, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '=' => [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        'a' => [0b00000, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111],
        'b' => [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b11110],
        'c' => [0b00000, 0b00000, 0b01110, 0b10000, 0b10000, 0b10001, 0b01110],
        'd' => [0b00001, 0b00001, 0b01101, 0b10011, 0b10001, 0b10001, 0b01111],
        'e' => [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        'f' => [0b00110, 0b01001, 0b01000, 0b11100, 0b01000, 0b01000, 0b01000],
        'g' => [0b00000, 0b01111, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110],
        'h' => [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001],
        'i' => [0b00100, 0b00000, 0b01100, 0b00100, 0b00100, 0b00100, 0b01110],
        'j' => [0b00010, 0b00000, 0b00110, 0b00010, 0b00010, 0b10010, 0b01100],
        'k' => [0b10000, 0b10000, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010],
        'l' => [0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'm' => [0b00000, 0b00000, 0b11010, 0b10101, 0b10101, 0b10001, 0b10001],
        'n' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001],
        'o' => [0b00000, 0b00000, 0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
        'p' => [0b00000, 0b00000, 0b11110, 0b10001, 0b11110, 0b10000, 0b10000],
        'q' => [0b00000, 0b00000, 0b01101, 0b10011, 0b01111, 0b00001, 0b00001],
        'r' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10000, 0b10000, 0b10000],
        's' => [0b00000, 0b00000, 0b01110, 0b10000, 0b01110, 0b00001, 0b11110],
        't' => [0b01000, 0b01000, 0b11100, 0b01000, 0b01000, 0b01001, 0b00110],
        'u' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10001, 0b10011, 0b01101],
        'v' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'w' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10101, 0b10101, 0b01010],
        'x' => [0b00000, 0b00000, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001],
        'y' => [0b00000, 0b00000, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110],
        'z' => [0b00000, 0b00000, 0b11111, 0b00010, 0b00100, 0b01000, 0b11111],
        _ => return None,
    };
    Some(rows)
}

// =============================================================================
// Tests
// =============================================================================
