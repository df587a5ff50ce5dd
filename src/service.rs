//! Per-kind orchestration of derived images.
//!
//! [`ImageService`] has two halves:
//!
//! - **Descriptors** (`captcha`, `map`, `multi`, `thumb`, `facebook`) build
//!   the signed relative URL a page embeds.
//! - **Artifacts** (`*_image`) verify the integrity token of an incoming
//!   request, resolve the cache path and serve the image through the
//!   [`DerivedImageCache`], generating it on a miss.
//!
//! Pixel work runs on `spawn_blocking`; tile fetches stay on the runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use image::{DynamicImage, Rgba};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::artifact::path::{
    captcha_path, facebook_path, facebook_source_path, map_path, multi_path, relative_path,
    thumb_path,
};
use crate::artifact::{Artifact, DerivedImageCache, Freshness};
use crate::codec::Slugger;
use crate::error::{ImageError, RenderError};
use crate::geo::{
    fit_zoom, latitude_to_sexagesimal, longitude_to_sexagesimal, Coordinate, CoordinateList,
    MAX_ZOOM, TILE_SIZE,
};
use crate::map::{MapCompositor, MapLimits, MapRequest, MarkerStyle};
use crate::render::{
    alt_text, crop_thumbnail, decode, disposition_stem, open_source, render_captcha,
    render_facebook, Align, ArtifactFormat, Captcha, CaptchaStyle, FacebookStyle, FacebookText,
    Painter, DEFAULT_JPEG_QUALITY,
};
use crate::storage;
use crate::tile::{TileCache, TileFetcher, TileServer};

/// Fill colour shared by every kind unless configured otherwise.
pub const DEFAULT_FILL: Rgba<u8> = Rgba([0xcc, 0xff, 0xff, 0xff]);

/// Border colour shared by every kind unless configured otherwise.
pub const DEFAULT_BORDER: Rgba<u8> = Rgba([0x00, 0xc3, 0xf9, 0xff]);

/// How long a CAPTCHA image stays valid.
pub const DEFAULT_CAPTCHA_TTL: Duration = Duration::from_secs(3600);

/// Cache name of the root page's facebook preview.
const INDEX_PAGE: &str = "index";

// =============================================================================
// Configuration
// =============================================================================

/// Output defaults of one image kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDefaults {
    pub width: u32,
    pub height: u32,
    pub format: ArtifactFormat,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl ImageDefaults {
    pub const fn new(width: u32, height: u32, format: ArtifactFormat, quality: u8) -> Self {
        Self {
            width,
            height,
            format,
            quality,
        }
    }
}

/// Drawing styles and defaults of every image kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageConfig {
    pub captcha: ImageDefaults,
    pub captcha_style: CaptchaStyle,
    /// Older captcha images are redrawn
    pub captcha_ttl: Duration,

    pub map: ImageDefaults,
    pub map_zoom: u8,
    pub map_marker: MarkerStyle,

    pub multi: ImageDefaults,
    pub multi_zoom: u8,
    pub multi_marker: MarkerStyle,
    /// Style of the markers sitting on the map centre
    pub multi_highlight: MarkerStyle,

    pub thumb: ImageDefaults,

    pub facebook: ImageDefaults,
    pub facebook_style: FacebookStyle,
    /// Default background of facebook previews; previews are disabled without one
    pub facebook_source: Option<PathBuf>,

    /// Directory thumbnail paths are resolved against
    pub source_root: PathBuf,
}

impl Default for ImageConfig {
    fn default() -> Self {
        let marker = MarkerStyle {
            fill: DEFAULT_FILL,
            border: DEFAULT_BORDER,
            radius: 5,
            thickness: 2,
            size: 14.0,
        };

        Self {
            captcha: ImageDefaults::new(192, 52, ArtifactFormat::Jpeg, DEFAULT_JPEG_QUALITY),
            captcha_style: CaptchaStyle {
                background: Rgba([0xff, 0xff, 0xff, 0xff]),
                fill: DEFAULT_FILL,
                border: DEFAULT_BORDER,
                size: 28.0,
                thickness: 6,
            },
            captcha_ttl: DEFAULT_CAPTCHA_TTL,

            map: ImageDefaults::new(640, 640, ArtifactFormat::Jpeg, DEFAULT_JPEG_QUALITY),
            map_zoom: 17,
            map_marker: marker,

            multi: ImageDefaults::new(640, 640, ArtifactFormat::Jpeg, DEFAULT_JPEG_QUALITY),
            multi_zoom: 17,
            multi_marker: marker,
            multi_highlight: MarkerStyle {
                fill: DEFAULT_BORDER,
                border: DEFAULT_FILL,
                radius: 6,
                ..marker
            },

            thumb: ImageDefaults::new(640, 640, ArtifactFormat::Jpeg, DEFAULT_JPEG_QUALITY),

            facebook: ImageDefaults::new(1200, 630, ArtifactFormat::Jpeg, DEFAULT_JPEG_QUALITY),
            facebook_style: FacebookStyle {
                size: 60.0,
                fill: DEFAULT_FILL,
                border: DEFAULT_BORDER,
                thickness: 15,
                align: Align::Center,
            },
            facebook_source: None,

            source_root: PathBuf::from("."),
        }
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// A CAPTCHA to embed in a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptchaChallenge {
    /// Keyed digest of the expected answer
    pub token: String,
    /// The expected answer
    pub value: String,
    /// Equation with operators spelled out, e.g. `7-mul-2-add-4`
    pub equation_slug: String,
    pub short: String,
    pub hash: String,
    pub src: String,
    pub width: u32,
    pub height: u32,
}

/// A single-marker map to embed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapDescriptor {
    pub latitude: f64,
    pub longitude: f64,
    pub hash: String,
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub zoom: u8,
}

/// A multi-marker map to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiDescriptor {
    /// Dash-joined `lat,lon` pairs
    pub coordinate: String,
    pub hash: String,
    pub src: String,
    pub width: u32,
    pub height: u32,
    /// Largest zoom showing every coordinate
    pub zoom: u8,
}

/// A thumbnail to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbDescriptor {
    pub short: String,
    pub hash: String,
    pub src: String,
    pub width: u32,
    pub height: u32,
}

/// Parameters of a facebook preview.
#[derive(Debug, Clone, PartialEq)]
pub struct FacebookRequest {
    /// Page path the preview belongs to, e.g. `/en/about`
    pub path: String,
    pub texts: Vec<FacebookText>,
    /// Previews older than this are redrawn
    pub updated: SystemTime,
    /// Background image; falls back to the configured source
    pub source: Option<PathBuf>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl FacebookRequest {
    pub fn new(path: impl Into<String>, texts: Vec<FacebookText>, updated: SystemTime) -> Self {
        Self {
            path: path.into(),
            texts,
            updated,
            source: None,
            width: None,
            height: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Open Graph metadata of a generated preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacebookImage {
    /// Relative URL, versioned with the preview's modification time
    pub image: String,
    pub alt: String,
    pub width: u32,
    pub height: u32,
}

impl FacebookImage {
    /// `og:image*` property/content pairs.
    pub fn properties(&self) -> [(&'static str, String); 4] {
        [
            ("og:image", self.image.clone()),
            ("og:image:alt", self.alt.clone()),
            ("og:image:height", self.height.to_string()),
            ("og:image:width", self.width.to_string()),
        ]
    }
}

/// A cached image ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedImage {
    pub data: Bytes,
    pub modified: SystemTime,
    pub format: ArtifactFormat,
    /// `Content-Disposition` file name
    pub filename: String,
    /// Sexagesimal latitude/longitude of a map centre
    pub gps: Option<(String, String)>,
    /// `true` if the image was generated for this request
    pub generated: bool,
}

impl ServedImage {
    fn new(artifact: Artifact, format: ArtifactFormat, filename: String) -> Self {
        Self {
            data: artifact.data,
            modified: artifact.modified,
            format,
            filename,
            gps: None,
            generated: artifact.generated,
        }
    }

    fn with_gps(mut self, center: Coordinate) -> Self {
        self.gps = Some((
            latitude_to_sexagesimal(center.latitude),
            longitude_to_sexagesimal(center.longitude),
        ));
        self
    }
}

// =============================================================================
// Service
// =============================================================================

/// Serves every derived image kind from one cache root.
pub struct ImageService<F> {
    slugger: Slugger,
    artifacts: DerivedImageCache,
    compositor: MapCompositor<F>,
    painter: Painter,
    config: ImageConfig,
}

impl<F: TileFetcher> ImageService<F> {
    /// Create a service writing artifacts under `cache_root`.
    pub fn new(
        slugger: Slugger,
        cache_root: impl Into<PathBuf>,
        tiles: Arc<TileCache<F>>,
        server: TileServer,
        config: ImageConfig,
    ) -> Self {
        Self {
            slugger,
            artifacts: DerivedImageCache::new(cache_root),
            compositor: MapCompositor::new(tiles, server),
            painter: Painter::default(),
            config,
        }
    }

    /// Use `painter` for every text and marker label.
    pub fn with_painter(mut self, painter: Painter) -> Self {
        self.compositor = self.compositor.with_painter(painter.clone());
        self.painter = painter;
        self
    }

    pub fn with_limits(mut self, limits: MapLimits) -> Self {
        self.compositor = self.compositor.with_limits(limits);
        self
    }

    pub fn slugger(&self) -> &Slugger {
        &self.slugger
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &DerivedImageCache {
        &self.artifacts
    }

    pub fn compositor(&self) -> &MapCompositor<F> {
        &self.compositor
    }

    fn cache_root(&self) -> &Path {
        self.artifacts.root()
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), ImageError> {
        let max = self.compositor.limits().max_dimension;
        if (1..=max).contains(&width) && (1..=max).contains(&height) {
            Ok(())
        } else {
            Err(ImageError::InvalidParameter(format!(
                "dimensions {width}x{height} outside 1-{max}"
            )))
        }
    }

    fn check_zoom(zoom: u8) -> Result<(), ImageError> {
        if zoom > MAX_ZOOM {
            return Err(ImageError::InvalidParameter(format!(
                "zoom {zoom} above {MAX_ZOOM}"
            )));
        }
        Ok(())
    }

    fn check_coordinate(latitude: f64, longitude: f64) -> Result<(), ImageError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(ImageError::InvalidParameter(format!(
                "coordinate {latitude},{longitude} is not finite"
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Descriptors
    // -------------------------------------------------------------------------

    /// A new random CAPTCHA.
    pub fn captcha(
        &self,
        height: Option<u32>,
        width: Option<u32>,
    ) -> Result<CaptchaChallenge, ImageError> {
        self.captcha_with_rng(&mut rand::rng(), height, width)
    }

    /// A new CAPTCHA drawn from `rng`.
    pub fn captcha_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        height: Option<u32>,
        width: Option<u32>,
    ) -> Result<CaptchaChallenge, ImageError> {
        let defaults = self.config.captcha;
        let height = height.unwrap_or(defaults.height);
        let width = width.unwrap_or(defaults.width);

        let captcha = Captcha::random(rng);
        let equation = captcha.equation();
        let value = captcha.value().to_string();

        let short = self.slugger.short(&equation)?;
        let hash = self.slugger.serialize(&(&short, height, width))?;

        Ok(CaptchaChallenge {
            token: self.slugger.hash_str(&value)?,
            value,
            equation_slug: equation_slug(&equation),
            src: format!(
                "/captcha/{hash}/{short}/{height}/{width}.{}",
                defaults.format.extension()
            ),
            short,
            hash,
            width,
            height,
        })
    }

    /// Check a CAPTCHA answer against the token of its challenge.
    pub fn verify_captcha(&self, token: &str, answer: &str) -> Result<bool, ImageError> {
        Ok(self.slugger.verify_hash_str(token, answer.trim())?)
    }

    /// A single-marker map centred on `(latitude, longitude)`.
    pub fn map(
        &self,
        latitude: f64,
        longitude: f64,
        height: Option<u32>,
        width: Option<u32>,
        zoom: Option<u8>,
    ) -> Result<MapDescriptor, ImageError> {
        let defaults = self.config.map;
        let height = height.unwrap_or(defaults.height);
        let width = width.unwrap_or(defaults.width);
        let zoom = zoom.unwrap_or(self.config.map_zoom);
        Self::check_zoom(zoom)?;
        Self::check_coordinate(latitude, longitude)?;

        let hash = self
            .slugger
            .hash(&(height, width, zoom, latitude, longitude))?;

        Ok(MapDescriptor {
            latitude,
            longitude,
            src: format!(
                "/map/{hash}/{latitude}/{longitude}/{zoom}/{height}/{width}.{}",
                defaults.format.extension()
            ),
            hash,
            width,
            height,
            zoom,
        })
    }

    /// A map showing every coordinate, zoomed in as far as they all fit.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidParameter`] for an empty list.
    pub fn multi(
        &self,
        coordinates: &[Coordinate],
        height: Option<u32>,
        width: Option<u32>,
        zoom: Option<u8>,
    ) -> Result<MultiDescriptor, ImageError> {
        for coordinate in coordinates {
            Self::check_coordinate(coordinate.latitude, coordinate.longitude)?;
        }
        let list = CoordinateList::new(coordinates.to_vec())
            .ok_or_else(|| ImageError::InvalidParameter("missing coordinates".to_string()))?;

        let defaults = self.config.multi;
        let height = height.unwrap_or(defaults.height);
        let width = width.unwrap_or(defaults.width);
        let max_zoom = zoom.unwrap_or(self.config.multi_zoom);
        Self::check_zoom(max_zoom)?;

        let zoom = fit_zoom(
            list.center(),
            list.coordinates(),
            width,
            height,
            max_zoom,
            TILE_SIZE,
        );
        let coordinate = list.to_string();
        let hash = self.slugger.hash(&(height, width, zoom, &coordinate))?;

        Ok(MultiDescriptor {
            src: format!(
                "/multi/{hash}/{coordinate}/{zoom}/{height}/{width}.{}",
                defaults.format.extension()
            ),
            coordinate,
            hash,
            width,
            height,
            zoom,
        })
    }

    /// A thumbnail of `path`, relative to the source root.
    pub fn thumb(
        &self,
        path: &str,
        height: Option<u32>,
        width: Option<u32>,
    ) -> Result<ThumbDescriptor, ImageError> {
        relative_path(path)?;

        let defaults = self.config.thumb;
        let height = height.unwrap_or(defaults.height);
        let width = width.unwrap_or(defaults.width);

        let short = self.slugger.short(path)?;
        let hash = self.slugger.serialize(&(&short, height, width))?;

        Ok(ThumbDescriptor {
            src: format!(
                "/thumb/{hash}/{short}/{height}/{width}.{}",
                defaults.format.extension()
            ),
            short,
            hash,
            width,
            height,
        })
    }

    /// Generate the facebook preview of a page and describe it.
    ///
    /// Returns `Ok(None)` when neither the request nor the configuration
    /// names a background image.
    ///
    /// # Errors
    ///
    /// - [`ImageError::InvalidPath`] if the page path escapes the cache
    /// - [`ImageError::Artifact`] if the background or preview cannot be
    ///   generated or written
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub async fn facebook(
        &self,
        request: FacebookRequest,
    ) -> Result<Option<FacebookImage>, ImageError> {
        let Some(source) = request
            .source
            .clone()
            .or_else(|| self.config.facebook_source.clone())
        else {
            return Ok(None);
        };

        let defaults = self.config.facebook;
        let height = request.height.unwrap_or(defaults.height);
        let width = request.width.unwrap_or(defaults.width);
        self.check_dimensions(width, height)?;

        let page = page_path(&request.path)?;
        let target = facebook_path(self.cache_root(), &page, defaults.format);
        let background_path = facebook_source_path(self.cache_root(), &page);

        let artifact = self
            .artifacts
            .get(&target, Freshness::Since(request.updated), || async {
                let background = self
                    .facebook_background(&source, &background_path, width, height)
                    .await?;
                let painter = self.painter.clone();
                let style = self.config.facebook_style;
                let texts = request.texts.clone();

                blocking(move || {
                    let background = decode(&background)?.to_rgba8();
                    let preview = render_facebook(&painter, &background, &texts, &style)?;
                    defaults
                        .format
                        .encode(&DynamicImage::ImageRgba8(preview), defaults.quality)
                })
                .await
            })
            .await?;

        let short = self.slugger.short(&request.path)?;
        let hash = self.slugger.serialize(&(&short, height, width))?;

        Ok(Some(FacebookImage {
            image: format!(
                "/facebook/{hash}/{short}/{height}/{width}.{}?u={}",
                defaults.format.extension(),
                unix_seconds(artifact.modified)
            ),
            alt: alt_text(&request.texts),
            width,
            height,
        }))
    }

    /// Cropped background of a preview, cached beside it and redrawn when
    /// the source changes.
    async fn facebook_background(
        &self,
        source: &Path,
        target: &Path,
        width: u32,
        height: u32,
    ) -> Result<Bytes, RenderError> {
        let source_modified = storage::modified(source)
            .await
            .ok_or_else(|| RenderError::Source(format!("{} does not exist", source.display())))?;

        let source = source.to_path_buf();
        let artifact = self
            .artifacts
            .get(target, Freshness::Since(source_modified), || {
                blocking(move || {
                    let image = open_source(&source)?;
                    ArtifactFormat::Png.encode(&crop_thumbnail(&image, width, height), 100)
                })
            })
            .await
            .map_err(|e| RenderError::Source(e.to_string()))?;

        Ok(artifact.data)
    }

    // -------------------------------------------------------------------------
    // Artifacts
    // -------------------------------------------------------------------------

    /// Serve a CAPTCHA image; `hash` must be `serialize([short, height, width])`.
    #[instrument(skip(self, hash))]
    pub async fn captcha_image(
        &self,
        hash: &str,
        short: &str,
        height: u32,
        width: u32,
        format: &str,
    ) -> Result<ServedImage, ImageError> {
        let format = parse_format(format)?;
        if !self.slugger.verify_serialized(hash, &(short, height, width))? {
            return Err(mismatch("captcha", hash));
        }
        self.check_dimensions(width, height)?;

        let equation = self.slugger.unshort(short)?;
        let path = captcha_path(self.cache_root(), &equation, short, format);
        let since = SystemTime::now()
            .checked_sub(self.config.captcha_ttl)
            .unwrap_or(UNIX_EPOCH);

        let painter = self.painter.clone();
        let style = self.config.captcha_style;
        let quality = self.config.captcha.quality;
        let text = equation.clone();

        let artifact = self
            .artifacts
            .get(&path, Freshness::Since(since), || {
                blocking(move || {
                    let canvas =
                        render_captcha(&painter, &text, width, height, &style, &mut rand::rng())?;
                    format.encode(&DynamicImage::ImageRgba8(canvas), quality)
                })
            })
            .await?;

        let filename = format!(
            "{}-{width}x{height}.{}",
            disposition_stem(&equation),
            format.extension()
        );
        Ok(ServedImage::new(artifact, format, filename))
    }

    /// Serve a single-marker map; `hash` must be
    /// `hash([height, width, zoom, latitude, longitude])`.
    #[instrument(skip(self, hash))]
    #[allow(clippy::too_many_arguments)]
    pub async fn map_image(
        &self,
        hash: &str,
        latitude: f64,
        longitude: f64,
        height: u32,
        width: u32,
        zoom: u8,
        format: &str,
    ) -> Result<ServedImage, ImageError> {
        let format = parse_format(format)?;
        Self::check_coordinate(latitude, longitude)?;
        if !self
            .slugger
            .verify_hash(hash, &(height, width, zoom, latitude, longitude))?
        {
            return Err(mismatch("map", hash));
        }
        Self::check_zoom(zoom)?;
        self.check_dimensions(width, height)?;

        let center = Coordinate::new(latitude, longitude);
        let path = map_path(self.cache_root(), center, zoom, width, height, format);
        let request = MapRequest::single(
            center,
            zoom,
            width,
            height,
            format,
            self.config.map_marker,
        )
        .with_quality(self.config.map.quality);

        let artifact = self
            .artifacts
            .get(&path, Freshness::Exists, || async {
                self.compositor.compose(&request).await.map(|map| map.data)
            })
            .await?;

        let filename = format!(
            "map-{latitude},{longitude}-{zoom}-{width}x{height}.{}",
            format.extension()
        );
        Ok(ServedImage::new(artifact, format, filename).with_gps(center))
    }

    /// Serve a multi-marker map; `hash` must be
    /// `hash([height, width, zoom, coordinate])`.
    #[instrument(skip(self, hash))]
    pub async fn multi_image(
        &self,
        hash: &str,
        coordinate: &str,
        height: u32,
        width: u32,
        zoom: u8,
        format: &str,
    ) -> Result<ServedImage, ImageError> {
        let format = parse_format(format)?;
        if !self
            .slugger
            .verify_hash(hash, &(height, width, zoom, coordinate))?
        {
            return Err(mismatch("multi", hash));
        }
        Self::check_zoom(zoom)?;
        self.check_dimensions(width, height)?;

        let list = CoordinateList::parse(coordinate).map_err(ImageError::InvalidParameter)?;
        let center = list.center();
        let path = multi_path(self.cache_root(), &list, zoom, width, height, format);
        let request = MapRequest::multi(
            &list,
            zoom,
            width,
            height,
            format,
            self.config.multi_marker,
            self.config.multi_highlight,
        )
        .with_quality(self.config.multi.quality);

        let artifact = self
            .artifacts
            .get(&path, Freshness::Exists, || async {
                self.compositor.compose(&request).await.map(|map| map.data)
            })
            .await?;

        let filename = format!(
            "multi-{coordinate}-{zoom}-{width}x{height}.{}",
            format.extension()
        );
        Ok(ServedImage::new(artifact, format, filename).with_gps(center))
    }

    /// Serve a thumbnail; `hash` must be `serialize([short, height, width])`.
    ///
    /// The thumbnail is redrawn whenever its source is newer.
    #[instrument(skip(self, hash))]
    pub async fn thumb_image(
        &self,
        hash: &str,
        short: &str,
        height: u32,
        width: u32,
        format: &str,
    ) -> Result<ServedImage, ImageError> {
        let format = parse_format(format)?;
        if !self.slugger.verify_serialized(hash, &(short, height, width))? {
            return Err(mismatch("thumb", hash));
        }
        self.check_dimensions(width, height)?;

        let original = self.slugger.unshort(short)?;
        let relative = relative_path(&original)?;
        let source = self.config.source_root.join(&relative);
        let source_modified = storage::modified(&source)
            .await
            .ok_or_else(|| ImageError::NotFound(original.clone()))?;

        let path = thumb_path(self.cache_root(), &relative, format);
        let quality = self.config.thumb.quality;

        let artifact = self
            .artifacts
            .get(&path, Freshness::Since(source_modified), || {
                blocking(move || {
                    let image = open_source(&source)?;
                    format.encode(&crop_thumbnail(&image, width, height), quality)
                })
            })
            .await?;

        let filename = format!(
            "thumb-{}-{width}x{height}.{}",
            original.trim_start_matches('/').replace('/', "_"),
            format.extension()
        );
        Ok(ServedImage::new(artifact, format, filename))
    }

    /// Serve a facebook preview generated earlier by [`Self::facebook`].
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::NotFound`] if the preview was never generated.
    #[instrument(skip(self, hash))]
    pub async fn facebook_image(
        &self,
        hash: &str,
        short: &str,
        height: u32,
        width: u32,
        format: &str,
    ) -> Result<ServedImage, ImageError> {
        let format = parse_format(format)?;
        if !self.slugger.verify_serialized(hash, &(short, height, width))? {
            return Err(mismatch("facebook", hash));
        }

        let original = self.slugger.unshort(short)?;
        let page = page_path(&original)?;
        let path = facebook_path(self.cache_root(), &page, format);

        let artifact = self
            .artifacts
            .existing(&path)
            .await?
            .ok_or_else(|| ImageError::NotFound(original.clone()))?;
        debug!(path = %path.display(), "serving facebook preview");

        let filename = format!(
            "facebook-{}-{width}x{height}.{}",
            page.to_string_lossy().replace('/', "_"),
            format.extension()
        );
        Ok(ServedImage::new(artifact, format, filename))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_format(format: &str) -> Result<ArtifactFormat, ImageError> {
    ArtifactFormat::from_extension(format)
        .ok_or_else(|| ImageError::UnsupportedFormat(format.to_string()))
}

fn mismatch(kind: &'static str, hash: &str) -> ImageError {
    ImageError::HashMismatch {
        kind,
        hash: hash.to_string(),
    }
}

/// Cache location of a page; the site root maps to `index`.
fn page_path(path: &str) -> Result<PathBuf, ImageError> {
    if path.trim_matches('/').is_empty() {
        Ok(PathBuf::from(INDEX_PAGE))
    } else {
        relative_path(path)
    }
}

/// `7 * 2 + 4` becomes `7-mul-2-add-4`.
fn equation_slug(equation: &str) -> String {
    equation
        .replace(' ', "-")
        .replace('*', "mul")
        .replace('+', "add")
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Run CPU-bound rendering off the async runtime.
async fn blocking<T, R>(render: R) -> Result<T, RenderError>
where
    T: Send + 'static,
    R: FnOnce() -> Result<T, RenderError> + Send + 'static,
{
    tokio::task::spawn_blocking(render)
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
}

// =============================================================================
// Tests
// =============================================================================
