//! Pixel generation for derived images.
//!
//! - [`ArtifactFormat`]: jpeg/png/webp encoding
//! - [`Painter`]: text layers, circles, blur and alpha helpers
//! - [`render_captcha`], [`crop_thumbnail`], [`render_facebook`]: per-kind generators
//!
//! Everything here is synchronous and CPU-bound; callers run it inside
//! `tokio::task::spawn_blocking`.

mod captcha;
mod draw;
mod encoder;
mod facebook;
mod thumb;

pub use captcha::{disposition_stem, render_captcha, Captcha, CaptchaStyle, DECOY_TEXT};
pub use draw::{
    blur, circle, colorize, parse_color, parse_color_arg, rotate, scale_alpha, stamp, Align,
    Painter, TextStyle, TRANSPARENT,
};
pub use encoder::{
    clamp_quality, decode, dimensions, ArtifactFormat, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use facebook::{
    alt_text, render_facebook, FacebookStyle, FacebookText, SIDE_MARGIN, STROKE_ALPHA_DIVISOR,
    STROKE_BLUR_SIGMA,
};
pub use thumb::{crop_thumbnail, open_source};
