//! CAPTCHA equations and their images.

use image::{Rgba, RgbaImage};
use rand::Rng;

use super::draw::{rotate, stamp, Painter, TextStyle};
use crate::error::RenderError;

/// Decoy text drawn behind every equation.
pub const DECOY_TEXT: &str = "stop spam";

/// Styling of a CAPTCHA image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptchaStyle {
    pub background: Rgba<u8>,
    pub fill: Rgba<u8>,
    pub border: Rgba<u8>,
    /// Equation glyph height; the decoy uses two thirds of it
    pub size: f32,
    /// Equation outline; the decoy uses a third of it
    pub thickness: u8,
}

// =============================================================================
// Equation
// =============================================================================

/// A three-digit equation `a * b + c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Captcha {
    pub a: u8,
    pub b: u8,
    pub c: u8,
}

impl Captcha {
    /// Split a number in `0..1000` into its decimal digits, units first.
    pub fn from_number(number: u16) -> Self {
        let number = number % 1000;
        Self {
            a: (number % 10) as u8,
            b: (number / 10 % 10) as u8,
            c: (number / 100 % 10) as u8,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_number(rng.random_range(0..1000))
    }

    /// Text form, `"a * b + c"`. Digits sit at character offsets 0, 4 and 8.
    pub fn equation(&self) -> String {
        format!("{} * {} + {}", self.a, self.b, self.c)
    }

    pub fn value(&self) -> u16 {
        u16::from(self.a) * u16::from(self.b) + u16::from(self.c)
    }
}

/// Download name for an equation image, without extension.
pub fn disposition_stem(equation: &str) -> String {
    let mut stem = String::from("captcha-stop-spam-");
    for c in equation.chars() {
        match c {
            ' ' => stem.push('-'),
            '*' => stem.push_str("mul"),
            '+' => stem.push_str("add"),
            other => stem.push(other),
        }
    }
    stem
}

// =============================================================================
// Rendering
// =============================================================================

/// Random angle in tenths of a degree within `tenths`, with random sign.
fn random_angle<R: Rng + ?Sized>(rng: &mut R, tenths: std::ops::RangeInclusive<u16>) -> f32 {
    let magnitude = f32::from(rng.random_range(tenths)) * 0.1;
    if rng.random_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

/// Draw `equation` over a rotated decoy on a `width`×`height` canvas.
///
/// # Errors
///
/// Returns [`RenderError::FontMissing`] if the painter cannot draw the text.
pub fn render_captcha<R: Rng + ?Sized>(
    painter: &Painter,
    equation: &str,
    width: u32,
    height: u32,
    style: &CaptchaStyle,
    rng: &mut R,
) -> Result<RgbaImage, RenderError> {
    let mut canvas = RgbaImage::from_pixel(width, height, style.background);
    let (cx, cy) = (i64::from(width) / 2, i64::from(height) / 2);

    let decoy_style = TextStyle {
        size: style.size / 1.5,
        fill: style.fill,
        stroke: style.border,
        thickness: style.thickness / 3,
    };
    let decoy_angle = random_angle(rng, 25..=75);
    let decoy = rotate(&painter.text_layer(DECOY_TEXT, &decoy_style)?, decoy_angle);

    let (decoy_width, _) = painter.measure(DECOY_TEXT, decoy_style.size);
    let spread = i64::from(decoy_width);
    let jitter = rng.random_range(-spread..=spread) / 2;
    let decoy_x = cx - jitter - decoy_angle.abs().round() as i64;
    let decoy_y = cy - i64::from(style.thickness) - decoy_angle.round() as i64;
    stamp(
        &mut canvas,
        &decoy,
        decoy_x - i64::from(decoy.width()) / 2,
        decoy_y - i64::from(decoy.height()) / 2,
    );

    let equation_style = TextStyle {
        size: style.size,
        fill: style.fill,
        stroke: style.border,
        thickness: style.thickness,
    };
    let layer = rotate(
        &painter.text_layer(equation, &equation_style)?,
        random_angle(rng, 25..=50),
    );
    stamp(
        &mut canvas,
        &layer,
        cx - i64::from(layer.width()) / 2,
        cy - i64::from(layer.height()) / 2,
    );

    Ok(canvas)
}
