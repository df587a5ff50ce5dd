//! Outbound tile fetching.
//!
//! [`TileFetcher`] is the seam between the tile cache and the network. The
//! production implementation is [`HttpTileFetcher`]; tests substitute a
//! counting in-memory fetcher.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::TileError;

/// Default maximum number of redirects followed per tile.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Default per-request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable overriding the redirect limit.
pub const ENV_REDIRECT: &str = "IMAGEPACK_REDIRECT";

/// Environment variable overriding the timeout, in (fractional) seconds.
pub const ENV_TIMEOUT: &str = "IMAGEPACK_TIMEOUT";

/// Environment variable overriding the User-Agent.
pub const ENV_AGENT: &str = "IMAGEPACK_AGENT";

/// Default User-Agent: `imagepack/<version>`.
pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

// =============================================================================
// Fetch Configuration
// =============================================================================

/// Bounds applied to every outbound tile request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub max_redirects: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `IMAGEPACK_REDIRECT`, `IMAGEPACK_TIMEOUT` and
    /// `IMAGEPACK_AGENT`. Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_REDIRECT) {
            match value.trim().parse() {
                Ok(n) => config.max_redirects = n,
                Err(_) => warn!(variable = ENV_REDIRECT, value = %value, "ignoring invalid value"),
            }
        }
        if let Some(value) = lookup(ENV_TIMEOUT) {
            match value.trim().parse::<f64>() {
                Ok(secs) if secs > 0.0 && secs.is_finite() => {
                    config.timeout = Duration::from_secs_f64(secs)
                }
                _ => warn!(variable = ENV_TIMEOUT, value = %value, "ignoring invalid value"),
            }
        }
        if let Some(value) = lookup(ENV_AGENT) {
            if !value.trim().is_empty() {
                config.user_agent = value;
            }
        }

        config
    }
}

// =============================================================================
// Fetcher Trait
// =============================================================================

/// Fetches raw tile bytes from a URL.
#[async_trait]
pub trait TileFetcher: Send + Sync + 'static {
    /// GET `url` and return the body.
    ///
    /// # Errors
    ///
    /// - [`TileError::Request`] on transport failure or timeout
    /// - [`TileError::Status`] on a non-2xx answer
    /// - [`TileError::Empty`] on an empty body
    async fn fetch(&self, url: &str) -> Result<Bytes, TileError>;
}

// =============================================================================
// HTTP Fetcher
// =============================================================================

/// reqwest-backed tile fetcher.
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpTileFetcher {
    /// Build a client honouring the redirect, timeout and User-Agent bounds.
    pub fn new(config: FetchConfig) -> Result<Self, TileError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TileError::Request {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, TileError> {
        debug!(url = %url, "fetching tile");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TileError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "tile server refused request");
            return Err(TileError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| TileError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if body.is_empty() {
            return Err(TileError::Empty {
                url: url.to_string(),
            });
        }

        Ok(body)
    }
}
