//! HTTP request handlers for the image endpoints.
//!
//! # Endpoints
//!
//! - `GET /captcha/{hash}/{equation}/{height}/{width}.{format}`
//! - `GET /thumb/{hash}/{path}/{height}/{width}.{format}`
//! - `GET /facebook/{hash}/{path}/{height}/{width}.{format}`
//! - `GET /map/{hash}/{latitude}/{longitude}/{zoom}/{height}/{width}.{format}`
//! - `GET /multi/{hash}/{coordinate}/{zoom}/{height}/{width}.{format}`
//! - `GET /health`

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use crate::error::{ArtifactError, ImageError, RenderError};
use crate::service::{ImageService, ServedImage};
use crate::tile::TileFetcher;

/// Default Cache-Control max-age in seconds.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the image service.
pub struct AppState<F: TileFetcher> {
    pub service: Arc<ImageService<F>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl<F: TileFetcher> AppState<F> {
    pub fn new(service: ImageService<F>) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    pub fn with_cache_max_age(service: ImageService<F>, cache_max_age: u32) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age,
        }
    }
}

impl<F: TileFetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters shared by captcha, thumb and facebook requests.
///
/// `token` is the short token of the equation or source path.
#[derive(Debug, Deserialize)]
pub struct TokenPathParams {
    pub hash: String,
    pub token: String,
    pub height: u32,
    /// `{width}.{format}`
    pub filename: String,
}

/// Path parameters of single-marker maps.
#[derive(Debug, Deserialize)]
pub struct MapPathParams {
    pub hash: String,
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
    pub height: u32,
    pub filename: String,
}

/// Path parameters of multi-marker maps.
#[derive(Debug, Deserialize)]
pub struct MultiPathParams {
    pub hash: String,
    /// Dash-joined `lat,lon` pairs
    pub coordinate: String,
    pub zoom: u8,
    pub height: u32,
    pub filename: String,
}

/// Split `{width}.{format}`.
pub fn parse_filename(filename: &str) -> Result<(u32, &str), ImageError> {
    let (width, format) = filename
        .split_once('.')
        .ok_or_else(|| ImageError::UnsupportedFormat(filename.to_string()))?;
    let width = width
        .parse()
        .map_err(|_| ImageError::InvalidParameter(format!("invalid width {width:?}")))?;
    Ok((width, format))
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_parameter")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

fn render_status(err: &RenderError) -> (StatusCode, &'static str) {
    match err {
        RenderError::Tile(_) => (StatusCode::BAD_GATEWAY, "tile_fetch_error"),
        RenderError::TooManyTiles { .. }
        | RenderError::TooManyMarkers { .. }
        | RenderError::InvalidDimensions { .. } => (StatusCode::BAD_REQUEST, "invalid_parameter"),
        RenderError::Source(_) => (StatusCode::NOT_FOUND, "not_found"),
        RenderError::FontMissing(_) | RenderError::Font(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "font_error")
        }
        RenderError::Decode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "decode_error"),
        RenderError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
        RenderError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
    }
}

/// Status and error type of an [`ImageError`].
pub fn error_status(err: &ImageError) -> (StatusCode, &'static str) {
    match err {
        ImageError::HashMismatch { .. } => (StatusCode::NOT_FOUND, "hash_mismatch"),
        ImageError::UnsupportedFormat(_) => (StatusCode::NOT_FOUND, "unsupported_format"),
        ImageError::Codec(_) => (StatusCode::NOT_FOUND, "invalid_token"),
        ImageError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        ImageError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "invalid_path"),
        ImageError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "invalid_parameter"),
        ImageError::Tile(_) => (StatusCode::BAD_GATEWAY, "tile_fetch_error"),
        ImageError::Render(render) | ImageError::Artifact(ArtifactError::Generate(render)) => {
            render_status(render)
        }
        ImageError::Artifact(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    }
}

/// Convert ImageError to HTTP response.
///
/// 5xx responses are logged at ERROR, 404s at DEBUG (common and expected)
/// and other 4xx at WARN.
impl IntoResponse for ImageError {
    fn into_response(self) -> Response {
        let (status, error_type) = error_status(&self);
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Image Responses
// =============================================================================

/// Strong ETag: hex SHA-256 of the request hash.
pub fn etag(hash: &str) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(hash.as_bytes())))
}

fn whole_seconds(time: SystemTime) -> SystemTime {
    let seconds = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    UNIX_EPOCH + Duration::from_secs(seconds)
}

/// `true` if the client's cached copy is still current.
fn not_modified(headers: &HeaderMap, etag: &str, modified: SystemTime) -> bool {
    if let Some(candidates) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        return candidates
            .split(',')
            .map(str::trim)
            .any(|c| c == "*" || c == etag || c.strip_prefix("W/") == Some(etag));
    }

    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .is_some_and(|since| whole_seconds(modified) <= since)
}

fn header_value(value: String) -> Result<HeaderValue, ImageError> {
    HeaderValue::try_from(value).map_err(|e| ImageError::InvalidParameter(e.to_string()))
}

/// Printable ASCII only; quotes and backslashes become `_`.
fn ascii_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}

/// `inline` disposition; non-ASCII names also get an RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback = ascii_filename(filename);
    if fallback == filename {
        format!("inline; filename=\"{fallback}\"")
    } else {
        format!(
            "inline; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

/// Build the response for a served image, or a 304 when the request's
/// validators match.
///
/// # Headers
///
/// - `Content-Type`, `Content-Disposition: inline; filename=...`
/// - `ETag`, `Last-Modified`, `Cache-Control: public, max-age=N`
/// - maps only: `X-Robots-Tag: noindex`, `X-GPS-Latitude`, `X-GPS-Longitude`
pub fn image_response(
    image: ServedImage,
    hash: &str,
    request_headers: &HeaderMap,
    cache_max_age: u32,
) -> Result<Response, ImageError> {
    let etag = etag(hash);
    let last_modified = httpdate::fmt_http_date(image.modified);

    let mut headers = HeaderMap::new();
    headers.insert(header::ETAG, header_value(etag.clone())?);
    headers.insert(header::LAST_MODIFIED, header_value(last_modified)?);
    headers.insert(
        header::CACHE_CONTROL,
        header_value(format!("public, max-age={cache_max_age}"))?,
    );

    if not_modified(request_headers, &etag, image.modified) {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(image.format.mime_type()),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(content_disposition(&image.filename))?,
    );
    if let Some((latitude, longitude)) = image.gps {
        headers.insert("X-Robots-Tag", HeaderValue::from_static("noindex"));
        headers.insert("X-GPS-Latitude", header_value(latitude)?);
        headers.insert("X-GPS-Longitude", header_value(longitude)?);
    }

    Ok((StatusCode::OK, headers, Body::from(image.data)).into_response())
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle CAPTCHA image requests.
///
/// # Endpoint
///
/// `GET /captcha/{hash}/{equation}/{height}/{width}.{format}`
///
/// # Response
///
/// - `200 OK`: the image
/// - `304 Not Modified`: validators match
/// - `404 Not Found`: hash mismatch, malformed token or unsupported format
pub async fn captcha_handler<F: TileFetcher>(
    State(state): State<AppState<F>>,
    Path(params): Path<TokenPathParams>,
    headers: HeaderMap,
) -> Result<Response, ImageError> {
    let (width, format) = parse_filename(&params.filename)?;
    let image = state
        .service
        .captcha_image(&params.hash, &params.token, params.height, width, format)
        .await?;
    image_response(image, &params.hash, &headers, state.cache_max_age)
}

/// Handle thumbnail requests.
///
/// `GET /thumb/{hash}/{path}/{height}/{width}.{format}`
pub async fn thumb_handler<F: TileFetcher>(
    State(state): State<AppState<F>>,
    Path(params): Path<TokenPathParams>,
    headers: HeaderMap,
) -> Result<Response, ImageError> {
    let (width, format) = parse_filename(&params.filename)?;
    let image = state
        .service
        .thumb_image(&params.hash, &params.token, params.height, width, format)
        .await?;
    image_response(image, &params.hash, &headers, state.cache_max_age)
}

/// Handle facebook preview requests. Previews are only served, never drawn
/// here.
///
/// `GET /facebook/{hash}/{path}/{height}/{width}.{format}`
pub async fn facebook_handler<F: TileFetcher>(
    State(state): State<AppState<F>>,
    Path(params): Path<TokenPathParams>,
    headers: HeaderMap,
) -> Result<Response, ImageError> {
    let (width, format) = parse_filename(&params.filename)?;
    let image = state
        .service
        .facebook_image(&params.hash, &params.token, params.height, width, format)
        .await?;
    image_response(image, &params.hash, &headers, state.cache_max_age)
}

/// Handle single-marker map requests.
///
/// # Endpoint
///
/// `GET /map/{hash}/{latitude}/{longitude}/{zoom}/{height}/{width}.{format}`
///
/// # Response
///
/// - `200 OK`: the map, with `X-GPS-*` headers
/// - `400 Bad Request`: zoom or size out of range
/// - `404 Not Found`: hash mismatch or unsupported format
/// - `502 Bad Gateway`: a tile could not be fetched
pub async fn map_handler<F: TileFetcher>(
    State(state): State<AppState<F>>,
    Path(params): Path<MapPathParams>,
    headers: HeaderMap,
) -> Result<Response, ImageError> {
    let (width, format) = parse_filename(&params.filename)?;
    let image = state
        .service
        .map_image(
            &params.hash,
            params.latitude,
            params.longitude,
            params.height,
            width,
            params.zoom,
            format,
        )
        .await?;
    image_response(image, &params.hash, &headers, state.cache_max_age)
}

/// Handle multi-marker map requests.
///
/// `GET /multi/{hash}/{coordinate}/{zoom}/{height}/{width}.{format}`
pub async fn multi_handler<F: TileFetcher>(
    State(state): State<AppState<F>>,
    Path(params): Path<MultiPathParams>,
    headers: HeaderMap,
) -> Result<Response, ImageError> {
    let (width, format) = parse_filename(&params.filename)?;
    let image = state
        .service
        .multi_image(
            &params.hash,
            &params.coordinate,
            params.height,
            width,
            params.zoom,
            format,
        )
        .await?;
    image_response(image, &params.hash, &headers, state.cache_max_age)
}

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
