//! Derived image cache.
//!
//! Every generated image (captcha, map, multi, thumb, facebook) lives at a
//! deterministic path under the cache root. [`DerivedImageCache`] serves the
//! file when it is fresh and otherwise regenerates it under a per-path lock.

mod cache;
pub mod path;

pub use cache::{Artifact, DerivedImageCache, Freshness};
