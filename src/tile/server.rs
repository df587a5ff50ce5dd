//! Tile server URL templates.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::TileError;

/// OpenStreetMap standard tiles.
pub const OSM_TEMPLATE: &str = "https://tile.openstreetmap.org/{Z}/{X}/{Y}.png";

/// Thunderforest OpenCycleMap tiles.
pub const CYCLE_TEMPLATE: &str = "http://a.tile.thunderforest.com/cycle/{Z}/{X}/{Y}.png";

/// Thunderforest transport tiles.
pub const TRANSPORT_TEMPLATE: &str = "http://a.tile.thunderforest.com/transport/{Z}/{X}/{Y}.png";

/// A named tile source.
///
/// The name scopes the on-disk tile cache so two servers never share tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileServer {
    name: Arc<str>,
    template: Arc<str>,
}

impl TileServer {
    /// Create a tile server from a name and a URL template containing the
    /// literal placeholders `{Z}`, `{X}` and `{Y}`.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::InvalidTemplate`] if a placeholder is missing,
    /// the template is not an absolute http(s) URL or the name is not a
    /// single safe path segment.
    pub fn new(name: &str, template: &str) -> Result<Self, TileError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TileError::InvalidTemplate(format!(
                "server name {name:?} must be alphanumeric"
            )));
        }
        for placeholder in ["{Z}", "{X}", "{Y}"] {
            if !template.contains(placeholder) {
                return Err(TileError::InvalidTemplate(format!(
                    "{template} lacks {placeholder}"
                )));
            }
        }
        let sample = substitute(template, 0, 0, 0);
        match url::Url::parse(&sample) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(url) => {
                return Err(TileError::InvalidTemplate(format!(
                    "{template} must be an http(s) URL, not {}",
                    url.scheme()
                )));
            }
            Err(e) => {
                return Err(TileError::InvalidTemplate(format!("{template}: {e}")));
            }
        }

        Ok(Self {
            name: name.into(),
            template: template.into(),
        })
    }

    pub fn osm() -> Self {
        Self::preset("osm", OSM_TEMPLATE)
    }

    pub fn cycle() -> Self {
        Self::preset("cycle", CYCLE_TEMPLATE)
    }

    pub fn transport() -> Self {
        Self::preset("transport", TRANSPORT_TEMPLATE)
    }

    fn preset(name: &str, template: &str) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    /// Look up a preset by name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "osm" => Some(Self::osm()),
            "cycle" => Some(Self::cycle()),
            "transport" => Some(Self::transport()),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute the tile address into the template.
    pub fn url(&self, zoom: u8, x: u32, y: u32) -> String {
        substitute(&self.template, zoom, x, y)
    }
}

fn substitute(template: &str, zoom: u8, x: u32, y: u32) -> String {
    template
        .replace("{Z}", &zoom.to_string())
        .replace("{X}", &x.to_string())
        .replace("{Y}", &y.to_string())
}

impl Default for TileServer {
    fn default() -> Self {
        Self::osm()
    }
}

impl fmt::Display for TileServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.template)
    }
}

/// Parses either a preset name or `name=template`.
impl FromStr for TileServer {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(server) = Self::by_name(s) {
            return Ok(server);
        }
        match s.split_once('=') {
            Some((name, template)) => Self::new(name, template),
            None => Err(TileError::InvalidTemplate(format!(
                "unknown tile server {s:?} (use osm, cycle, transport or name=template)"
            ))),
        }
    }
}
