use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the reversible token codec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// No alphabet or secret was configured
    #[error("Codec is not configured: {0}")]
    NotConfigured(&'static str),

    /// The alphabet contains the same character twice
    #[error("Invalid alphabet: character {character:?} repeated at position {position}")]
    InvalidAlphabet { character: char, position: usize },

    /// The alphabet cannot be addressed with one byte per symbol
    #[error("Alphabet too large: {len} symbols (maximum is 256)")]
    AlphabetTooLarge { len: usize },

    /// Input character is absent from the alphabet
    #[error("Unknown character {character:?} at position {position}")]
    UnknownCharacter { character: char, position: usize },

    /// Malformed base64 or a symbol outside the alphabet
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(String),
}

/// Errors raised while fetching or storing map tiles.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Network failure, timeout, or too many redirects
    #[error("Tile request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Upstream answered with a non-success status
    #[error("Tile server returned {status} for {url}")]
    Status { url: String, status: u16 },

    /// Upstream answered with an empty body
    #[error("Tile server returned an empty body for {url}")]
    Empty { url: String },

    /// Tile index outside the world at this zoom
    #[error("Tile {x},{y} is outside zoom level {zoom}")]
    OutOfRange { zoom: u8, x: i64, y: i64 },

    /// Server template lacks one of the {Z}, {X}, {Y} placeholders
    #[error("Invalid tile server template: {0}")]
    InvalidTemplate(String),

    /// Local tile storage failure
    #[error("Tile storage error: {0}")]
    Io(String),
}

/// Errors raised while producing image pixels.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// A tile could not be fetched; the whole composition is aborted
    #[error(transparent)]
    Tile(#[from] TileError),

    #[error("Tile grid of {count} tiles exceeds the limit of {max}")]
    TooManyTiles { count: usize, max: usize },

    #[error("{count} markers exceed the limit of {max}")]
    TooManyMarkers { count: usize, max: usize },

    #[error("Invalid dimensions {width}x{height} (each side must be 1-{max})")]
    InvalidDimensions { width: u32, height: u32, max: u32 },

    /// Text outside the built-in face needs a configured font
    #[error("No font configured to render {0:?}")]
    FontMissing(String),

    #[error("Invalid font: {0}")]
    Font(String),

    /// Source image for a thumbnail or preview is unavailable
    #[error("Source image error: {0}")]
    Source(String),

    /// A blocking render task panicked or was cancelled
    #[error("Render task failed: {0}")]
    Task(String),
}

/// Errors raised by the on-disk derived image cache.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Unable to create directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generator callback failed
    #[error(transparent)]
    Generate(#[from] RenderError),

    /// A blocking render task panicked or was cancelled
    #[error("Render task failed: {0}")]
    Join(String),
}

/// Errors surfaced to callers of the image service.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Request parameters do not match the supplied integrity token
    #[error("Unable to match {kind} hash: {hash}")]
    HashMismatch { kind: &'static str, hash: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Path escapes the configured root or is otherwise unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Tile(#[from] TileError),
}
