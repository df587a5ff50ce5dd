//! Command-line and environment configuration.
//!
//! Every serve option can be given as a flag or as an `IMAGEPACK_*`
//! environment variable:
//!
//! - `IMAGEPACK_HOST` - Bind address (default: 0.0.0.0)
//! - `IMAGEPACK_PORT` - Port (default: 3000)
//! - `IMAGEPACK_SECRET` - Token secret (required)
//! - `IMAGEPACK_CACHE_DIR` - Root of the image and tile caches (default: ./cache)
//! - `IMAGEPACK_SOURCE_ROOT` - Directory thumbnail sources live in (default: .)
//! - `IMAGEPACK_TILE_SERVER` - `osm`, `cycle`, `transport` or `name=template`
//! - `IMAGEPACK_REDIRECT` - Redirects followed per tile fetch (default: 20)
//! - `IMAGEPACK_TIMEOUT` - Tile fetch timeout in seconds (default: 60)
//! - `IMAGEPACK_AGENT` - User-Agent of tile fetches
//! - `IMAGEPACK_FONT` - TrueType font for text and labels
//! - `IMAGEPACK_FACEBOOK_SOURCE` - Default facebook preview background
//! - `IMAGEPACK_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `IMAGEPACK_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//! - `IMAGEPACK_MAX_TILES` / `IMAGEPACK_MAX_MARKERS` - Composition bounds
//! - `IMAGEPACK_TILE_MEMORY` - Bytes of tiles kept in memory

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use image::Rgba;

use crate::codec::Slugger;
use crate::geo::{CoordinateList, MAX_ZOOM};
use crate::map::{MapLimits, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_MARKERS, DEFAULT_MAX_TILES};
use crate::render::{parse_color_arg, DEFAULT_JPEG_QUALITY};
use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::service::ImageConfig;
use crate::tile::{
    default_user_agent, FetchConfig, TileServer, DEFAULT_MAX_REDIRECTS,
    DEFAULT_TILE_MEMORY_CAPACITY, ENV_AGENT, ENV_REDIRECT, ENV_TIMEOUT,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default cache directory.
pub const DEFAULT_CACHE_DIR: &str = "./cache";

/// Default tile fetch timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 60.0;

// =============================================================================
// CLI
// =============================================================================

/// imagepack - generated images served from a disk cache.
///
/// Runs the image server when no subcommand is given.
#[derive(Parser, Debug, Clone)]
#[command(name = "imagepack")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The command to run, `serve` by default.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the image server
    Serve(ServeConfig),

    /// Print the URL of an image
    Sign(SignConfig),

    /// Check the configuration, cache directory and tile server
    Check(CheckConfig),
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMAGEPACK_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMAGEPACK_PORT")]
    pub port: u16,

    /// Secret keying every token and hash.
    #[arg(long, env = "IMAGEPACK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    // =========================================================================
    // Storage
    // =========================================================================
    /// Root directory of the image and tile caches.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "IMAGEPACK_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Directory thumbnail sources are resolved against.
    #[arg(long, default_value = ".", env = "IMAGEPACK_SOURCE_ROOT")]
    pub source_root: PathBuf,

    /// Default background of facebook previews.
    ///
    /// Previews are disabled unless a page supplies its own background.
    #[arg(long, env = "IMAGEPACK_FACEBOOK_SOURCE")]
    pub facebook_source: Option<PathBuf>,

    // =========================================================================
    // Tiles
    // =========================================================================
    /// Tile server: `osm`, `cycle`, `transport` or `name=template`.
    #[arg(long, default_value = "osm", env = "IMAGEPACK_TILE_SERVER")]
    pub tile_server: TileServer,

    /// Redirects followed per tile fetch.
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS, env = ENV_REDIRECT)]
    pub max_redirects: usize,

    /// Tile fetch timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = ENV_TIMEOUT)]
    pub timeout: f64,

    /// User-Agent of tile fetches (default: imagepack/<version>).
    #[arg(long, env = ENV_AGENT)]
    pub user_agent: Option<String>,

    /// Bytes of tiles kept in memory in front of the disk cache.
    #[arg(long, default_value_t = DEFAULT_TILE_MEMORY_CAPACITY, env = "IMAGEPACK_TILE_MEMORY")]
    pub tile_memory: usize,

    /// Most tiles a single map may use.
    #[arg(long, default_value_t = DEFAULT_MAX_TILES, env = "IMAGEPACK_MAX_TILES")]
    pub max_tiles: usize,

    /// Most markers a single map may draw.
    #[arg(long, default_value_t = DEFAULT_MAX_MARKERS, env = "IMAGEPACK_MAX_MARKERS")]
    pub max_markers: usize,

    // =========================================================================
    // Drawing
    // =========================================================================
    /// TrueType font for captions and labels (default: built-in bitmap face).
    #[arg(long, env = "IMAGEPACK_FONT")]
    pub font: Option<PathBuf>,

    /// Fill colour of text and markers (`#rgb`, `#rrggbb`, `#rrggbbaa`).
    #[arg(long, env = "IMAGEPACK_FILL", value_parser = parse_color_arg)]
    pub fill: Option<Rgba<u8>>,

    /// Border colour of text and markers.
    #[arg(long, env = "IMAGEPACK_BORDER", value_parser = parse_color_arg)]
    pub border: Option<Rgba<u8>>,

    /// JPEG quality of generated images (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "IMAGEPACK_QUALITY")]
    pub quality: u8,

    // =========================================================================
    // HTTP
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "IMAGEPACK_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "IMAGEPACK_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let secret = self.secret.as_deref().unwrap_or("");
        if secret.is_empty() {
            return Err("No secret provided. Set --secret or IMAGEPACK_SECRET".to_string());
        }
        Slugger::new(secret).map_err(|e| format!("invalid secret: {e}"))?;

        if !(self.timeout > 0.0 && self.timeout.is_finite()) {
            return Err("timeout must be a positive number of seconds".to_string());
        }
        if self.max_tiles == 0 {
            return Err("max_tiles must be greater than 0".to_string());
        }
        if self.max_markers == 0 {
            return Err("max_markers must be greater than 0".to_string());
        }
        if self.tile_memory == 0 {
            return Err("tile_memory must be greater than 0".to_string());
        }
        if self.quality == 0 || self.quality > 100 {
            return Err("quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The secret, empty when unset (call validate() first).
    pub fn secret_or_empty(&self) -> &str {
        self.secret.as_deref().unwrap_or("")
    }

    /// Directory tiles are cached in.
    pub fn tile_dir(&self) -> PathBuf {
        self.cache_dir.join(crate::artifact::path::TILE_DIR)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_redirects: self.max_redirects,
            timeout: Duration::from_secs_f64(self.timeout),
            user_agent: self
                .user_agent
                .clone()
                .filter(|agent| !agent.trim().is_empty())
                .unwrap_or_else(default_user_agent),
        }
    }

    pub fn map_limits(&self) -> MapLimits {
        MapLimits {
            max_tiles: self.max_tiles,
            max_markers: self.max_markers,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Image defaults with the colour, quality and path overrides applied.
    pub fn image_config(&self) -> ImageConfig {
        let mut config = ImageConfig {
            facebook_source: self.facebook_source.clone(),
            source_root: self.source_root.clone(),
            ..ImageConfig::default()
        };

        for defaults in [
            &mut config.captcha,
            &mut config.map,
            &mut config.multi,
            &mut config.thumb,
            &mut config.facebook,
        ] {
            defaults.quality = self.quality;
        }

        if let Some(fill) = self.fill {
            config.captcha_style.fill = fill;
            config.map_marker.fill = fill;
            config.multi_marker.fill = fill;
            config.multi_highlight.border = fill;
            config.facebook_style.fill = fill;
        }
        if let Some(border) = self.border {
            config.captcha_style.border = border;
            config.map_marker.border = border;
            config.multi_marker.border = border;
            config.multi_highlight.fill = border;
            config.facebook_style.border = border;
        }

        config
    }
}

// =============================================================================
// Sign
// =============================================================================

/// Kind of image to print a URL for.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignKind {
    Captcha,
    Map,
    Multi,
    Thumb,
}

/// Output format of the sign command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignOutputFormat {
    /// The image URL only
    #[default]
    Url,
    /// The full descriptor as JSON
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Kind of image.
    #[arg(value_enum)]
    pub kind: SignKind,

    /// Secret keying the tokens; must match the server's.
    #[arg(long, env = "IMAGEPACK_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Map centre latitude.
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    /// Map centre longitude.
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,

    /// Multi-marker coordinates, `lat,lon-lat,lon`.
    #[arg(long, allow_hyphen_values = true)]
    pub coordinates: Option<String>,

    /// Thumbnail source, relative to the source root.
    #[arg(long)]
    pub path: Option<String>,

    /// Image width (default: the kind's default).
    #[arg(long)]
    pub width: Option<u32>,

    /// Image height (default: the kind's default).
    #[arg(long)]
    pub height: Option<u32>,

    /// Zoom level, or the highest zoom tried for multi-marker maps.
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Base URL prepended to the image path.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Url)]
    pub output: SignOutputFormat,
}

impl SignConfig {
    /// Validate that the options needed by `kind` are present.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret cannot be empty".to_string());
        }
        Slugger::new(&self.secret).map_err(|e| format!("invalid secret: {e}"))?;

        if let Some(zoom) = self.zoom {
            if zoom > MAX_ZOOM {
                return Err(format!("zoom must be at most {MAX_ZOOM}"));
            }
        }
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if let Some(value) = value {
                if value == 0 || value > DEFAULT_MAX_DIMENSION {
                    return Err(format!("{name} must be between 1 and {DEFAULT_MAX_DIMENSION}"));
                }
            }
        }

        match self.kind {
            SignKind::Captcha => Ok(()),
            SignKind::Map => match (self.latitude, self.longitude) {
                (Some(_), Some(_)) => Ok(()),
                _ => Err("map requires --latitude and --longitude".to_string()),
            },
            SignKind::Multi => {
                let text = self
                    .coordinates
                    .as_deref()
                    .ok_or_else(|| "multi requires --coordinates".to_string())?;
                CoordinateList::parse(text).map(|_| ())
            }
            SignKind::Thumb => match self.path.as_deref() {
                Some(path) if !path.is_empty() => Ok(()),
                _ => Err("thumb requires --path".to_string()),
            },
        }
    }

    /// Join `src` onto the base URL, if any.
    pub fn url(&self, src: &str) -> String {
        match self.base_url.as_deref() {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), src),
            None => src.to_string(),
        }
    }
}

// =============================================================================
// Check
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Root directory of the image and tile caches.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "IMAGEPACK_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Secret to validate.
    #[arg(long, env = "IMAGEPACK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Tile server to test.
    #[arg(long, default_value = "osm", env = "IMAGEPACK_TILE_SERVER")]
    pub tile_server: TileServer,

    /// TrueType font to load.
    #[arg(long, env = "IMAGEPACK_FONT")]
    pub font: Option<PathBuf>,

    /// Fetch tile 0/0/0 from the tile server.
    #[arg(long, default_value_t = false)]
    pub test_tile: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
