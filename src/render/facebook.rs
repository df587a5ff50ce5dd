//! Open Graph preview images: a cropped background with outlined text.
//!
//! Outlines are drawn on their own layer, blurred and faded, then composited
//! under the fill text so the text stays legible on any background.

use image::{Rgba, RgbaImage};

use super::draw::{blur, scale_alpha, stamp, Align, Painter, TextStyle, TRANSPARENT};
use crate::error::RenderError;

/// Gaussian sigma applied to the outline layer.
pub const STROKE_BLUR_SIGMA: f32 = 3.0;

/// The outline layer's alpha is divided by this.
pub const STROKE_ALPHA_DIVISOR: f32 = 1.5;

/// Distance between a side-aligned text and the image edge.
pub const SIDE_MARGIN: i64 = 50;

/// Default styling of preview texts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacebookStyle {
    pub size: f32,
    pub fill: Rgba<u8>,
    pub border: Rgba<u8>,
    pub thickness: u8,
    pub align: Align,
}

/// One line of text on a preview. Unset fields take the [`FacebookStyle`]
/// default.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FacebookText {
    pub text: String,
    /// Anchor x, interpreted through `align`
    pub x: Option<i64>,
    /// Vertical centre of the line
    pub y: Option<i64>,
    pub align: Option<Align>,
    pub size: Option<f32>,
    pub fill: Option<Rgba<u8>>,
    pub border: Option<Rgba<u8>>,
    pub thickness: Option<u8>,
    /// Canonical lines are drawn but left out of the alt text
    pub canonical: bool,
}

impl FacebookText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn canonical(mut self) -> Self {
        self.canonical = true;
        self
    }
}

/// Alt text: non-canonical lines joined by `" - "`, newlines flattened.
pub fn alt_text(texts: &[FacebookText]) -> String {
    texts
        .iter()
        .filter(|t| !t.canonical)
        .map(|t| t.text.replace('\n', " "))
        .collect::<Vec<_>>()
        .join(" - ")
}

/// A text line with every default resolved.
struct Placed<'a> {
    text: &'a str,
    style: TextStyle,
    left: i64,
    top: i64,
}

fn place<'a>(
    painter: &Painter,
    texts: &'a [FacebookText],
    width: u32,
    height: u32,
    defaults: &FacebookStyle,
) -> Vec<Placed<'a>> {
    let count = texts.len() as i64;

    texts
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let style = TextStyle {
                size: line.size.unwrap_or(defaults.size),
                fill: line.fill.unwrap_or(defaults.fill),
                stroke: line.border.unwrap_or(defaults.border),
                thickness: line.thickness.unwrap_or(defaults.thickness),
            };
            let align = line.align.unwrap_or(defaults.align);

            // Lines are spread evenly, overflowing 50 px above and below
            let y = line.y.unwrap_or_else(|| {
                (i64::from(height) + 100) * (index as i64 + 1) / (count + 1) - 50
            });
            let x = line.x.unwrap_or(match align {
                Align::Left => SIDE_MARGIN,
                Align::Center => i64::from(width) / 2,
                Align::Right => i64::from(width) - SIDE_MARGIN,
            });

            let (text_width, text_height) = painter.measure(&line.text, style.size);
            let pad = i64::from(style.thickness);

            Placed {
                text: &line.text,
                style,
                left: align.left_edge(x, text_width) - pad,
                top: y - i64::from(text_height) / 2 - pad,
            }
        })
        .collect()
}

/// Draw `texts` over `background`.
///
/// # Errors
///
/// Returns [`RenderError::FontMissing`] if a line cannot be drawn.
pub fn render_facebook(
    painter: &Painter,
    background: &RgbaImage,
    texts: &[FacebookText],
    defaults: &FacebookStyle,
) -> Result<RgbaImage, RenderError> {
    let (width, height) = background.dimensions();
    let placed = place(painter, texts, width, height, defaults);

    let mut strokes = RgbaImage::from_pixel(width, height, TRANSPARENT);
    for line in placed.iter().filter(|p| p.style.thickness > 0) {
        let layer = painter.stroke_layer(line.text, &line.style)?;
        stamp(&mut strokes, &layer, line.left, line.top);
    }
    let mut strokes = blur(&strokes, STROKE_BLUR_SIGMA);
    scale_alpha(&mut strokes, STROKE_ALPHA_DIVISOR);

    let mut canvas = background.clone();
    stamp(&mut canvas, &strokes, 0, 0);

    for line in &placed {
        let layer = painter.fill_layer(line.text, &line.style)?;
        stamp(&mut canvas, &layer, line.left, line.top);
    }

    Ok(canvas)
}
