//! Cache locations of derived images.
//!
//! ```text
//! <root>/captcha/<e0>/<e4>/<e8>/<short>.<ext>
//! <root>/map/<zoom>/<lat digit>/<lon digit>/<lat>,<lon>-<zoom>-<w>x<h>.<ext>
//! <root>/multi/<zoom>/<lat digit>/<lon digit>/<coordinates>-<zoom>-<w>x<h>.<ext>
//! <root>/thumb/<source path>.<ext>
//! <root>/facebook/<page path>.<ext>
//! ```
//!
//! Map shard digits are `trunc(value * 1e6) % 10`, so negative values give
//! negative digits.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::ImageError;
use crate::geo::{Coordinate, CoordinateList};
use crate::render::ArtifactFormat;

pub const CAPTCHA_DIR: &str = "captcha";
pub const MAP_DIR: &str = "map";
pub const MULTI_DIR: &str = "multi";
pub const THUMB_DIR: &str = "thumb";
pub const FACEBOOK_DIR: &str = "facebook";
pub const TILE_DIR: &str = "tile";

/// Suffix of the cropped background kept beside a facebook preview.
pub const FACEBOOK_SOURCE_SUFFIX: &str = "source.png";

fn with_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    let mut os: OsString = path.into_os_string();
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}

fn shard_digit(value: f64) -> i64 {
    (value * 1_000_000.0) as i64 % 10
}

/// Normalize a caller-supplied path into a relative path with no `..`.
///
/// Leading slashes and `.` segments are dropped.
///
/// # Errors
///
/// Returns [`ImageError::InvalidPath`] for `..` segments, Windows prefixes
/// or an empty result.
pub fn relative_path(path: &str) -> Result<PathBuf, ImageError> {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(ImageError::InvalidPath(path.to_string()));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(ImageError::InvalidPath(path.to_string()));
    }
    Ok(relative)
}

/// CAPTCHA image, sharded on the three digits of `equation`.
pub fn captcha_path(root: &Path, equation: &str, short: &str, format: ArtifactFormat) -> PathBuf {
    let chars: Vec<char> = equation.chars().collect();
    let mut path = root.join(CAPTCHA_DIR);
    for index in [0, 4, 8] {
        let shard = chars.get(index).copied().unwrap_or('_');
        path.push(shard.to_string());
    }
    path.join(format!("{short}.{}", format.extension()))
}

/// Single-marker map.
pub fn map_path(
    root: &Path,
    center: Coordinate,
    zoom: u8,
    width: u32,
    height: u32,
    format: ArtifactFormat,
) -> PathBuf {
    root.join(MAP_DIR)
        .join(zoom.to_string())
        .join(shard_digit(center.latitude).to_string())
        .join(shard_digit(center.longitude).to_string())
        .join(format!(
            "{},{}-{zoom}-{width}x{height}.{}",
            center.latitude,
            center.longitude,
            format.extension()
        ))
}

/// Multi-marker map, sharded on its centre.
pub fn multi_path(
    root: &Path,
    coordinates: &CoordinateList,
    zoom: u8,
    width: u32,
    height: u32,
    format: ArtifactFormat,
) -> PathBuf {
    let center = coordinates.center();
    root.join(MULTI_DIR)
        .join(zoom.to_string())
        .join(shard_digit(center.latitude).to_string())
        .join(shard_digit(center.longitude).to_string())
        .join(format!(
            "{coordinates}-{zoom}-{width}x{height}.{}",
            format.extension()
        ))
}

/// Thumbnail of a source image, `source` being relative to the source root.
pub fn thumb_path(root: &Path, source: &Path, format: ArtifactFormat) -> PathBuf {
    with_suffix(root.join(THUMB_DIR).join(source), format.extension())
}

/// Facebook preview of a page.
pub fn facebook_path(root: &Path, page: &Path, format: ArtifactFormat) -> PathBuf {
    with_suffix(root.join(FACEBOOK_DIR).join(page), format.extension())
}

/// Cropped background of a facebook preview.
pub fn facebook_source_path(root: &Path, page: &Path) -> PathBuf {
    with_suffix(root.join(FACEBOOK_DIR).join(page), FACEBOOK_SOURCE_SUFFIX)
}
