//! imagepack - generated images served from a disk cache.
//!
//! This binary starts the HTTP server and configures all components.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imagepack::{
    artifact::DerivedImageCache,
    codec::Slugger,
    config::{
        CheckConfig, Cli, Command, ServeConfig, SignConfig, SignKind, SignOutputFormat,
        DEFAULT_CACHE_DIR,
    },
    geo::CoordinateList,
    render::Painter,
    server::{create_router, RouterConfig},
    service::{ImageConfig, ImageService},
    tile::{FetchConfig, HttpTileFetcher, TileCache, TileFetcher, TileMemoryCache, TileServer},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    let fetch = config.fetch_config();
    info!("Configuration:");
    info!("  Cache directory: {}", config.cache_dir.display());
    info!("  Source root: {}", config.source_root.display());
    info!(
        "  Tile server: {} ({})",
        config.tile_server.name(),
        config.tile_server.template()
    );
    info!(
        "  Tile fetch: {} redirects, {:.1}s timeout, agent {:?}",
        fetch.max_redirects,
        fetch.timeout.as_secs_f64(),
        fetch.user_agent
    );
    info!(
        "  Limits: {} tiles, {} markers per map",
        config.max_tiles, config.max_markers
    );
    match config.facebook_source {
        Some(ref source) => info!("  Facebook background: {}", source.display()),
        None => warn!("  Facebook background: none, previews need a per-page source"),
    }

    let slugger = match Slugger::new(config.secret_or_empty()) {
        Ok(slugger) => slugger,
        Err(e) => {
            error!("Invalid secret: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let painter = match load_painter(config.font.as_deref()).await {
        Ok(painter) => painter,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpTileFetcher::new(fetch) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create tile fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tiles = Arc::new(TileCache::with_memory(
        config.tile_dir(),
        fetcher,
        TileMemoryCache::with_capacity(config.tile_memory),
    ));

    let service = ImageService::new(
        slugger,
        config.cache_dir.clone(),
        tiles,
        config.tile_server.clone(),
        config.image_config(),
    )
    .with_painter(painter)
    .with_limits(config.map_limits());

    if let Err(e) = service.artifacts().check_writable().await {
        error!("Cache directory is not writable: {}", e);
        return ExitCode::FAILURE;
    }

    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("");
    info!("  Print an image URL:");
    info!("    imagepack sign map --latitude 48.8566 --longitude 2.3522");
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██╗███╗   ███╗ █████╗  ██████╗ ███████╗██████╗  █████╗  ██████╗██╗  ██╗");
    info!("██║████╗ ████║██╔══██╗██╔════╝ ██╔════╝██╔══██╗██╔══██╗██╔════╝██║ ██╔╝");
    info!("██║██╔████╔██║███████║██║  ███╗█████╗  ██████╔╝███████║██║     █████╔╝ ");
    info!("██║██║╚██╔╝██║██╔══██║██║   ██║██╔══╝  ██╔═══╝ ██╔══██║██║     ██╔═██╗ ");
    info!("██║██║ ╚═╝ ██║██║  ██║╚██████╔╝███████╗██║     ██║  ██║╚██████╗██║  ██╗");
    info!("╚═╝╚═╝     ╚═╝╚═╝  ╚═╝ ╚═════╝ ╚══════╝╚═╝     ╚═╝  ╚═╝ ╚═════╝╚═╝  ╚═╝");
    info!("");
    info!("                                v{}", version);
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "imagepack=debug,tower_http=debug"
    } else {
        "imagepack=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

/// The configured TrueType font, or the built-in bitmap face.
async fn load_painter(font: Option<&Path>) -> Result<Painter, String> {
    let Some(path) = font else {
        return Ok(Painter::default());
    };
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read font {}: {}", path.display(), e))?;
    Painter::from_font_bytes(data).map_err(|e| format!("Invalid font {}: {}", path.display(), e))
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match sign(&config) {
        Ok(output) => {
            println!("{}", output);
            if config.output == SignOutputFormat::Url && config.base_url.is_none() {
                eprintln!();
                eprintln!("Tip: Use --base-url to generate a complete URL");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Describe the requested image and format it for output.
fn sign(config: &SignConfig) -> Result<String, String> {
    let slugger = Slugger::new(&config.secret).map_err(|e| e.to_string())?;
    // Descriptors never touch the network or the cache directory.
    let fetcher = HttpTileFetcher::new(FetchConfig::default()).map_err(|e| e.to_string())?;
    let cache_dir = PathBuf::from(DEFAULT_CACHE_DIR);
    let tiles = Arc::new(TileCache::new(cache_dir.clone(), fetcher));
    let service = ImageService::new(
        slugger,
        cache_dir,
        tiles,
        TileServer::osm(),
        ImageConfig::default(),
    );

    let (width, height, zoom) = (config.width, config.height, config.zoom);
    match config.kind {
        SignKind::Captcha => {
            let captcha = service.captcha(height, width).map_err(|e| e.to_string())?;
            format_descriptor(config, &captcha, &captcha.src)
        }
        SignKind::Map => {
            let (Some(latitude), Some(longitude)) = (config.latitude, config.longitude) else {
                return Err("map requires --latitude and --longitude".to_string());
            };
            let map = service
                .map(latitude, longitude, height, width, zoom)
                .map_err(|e| e.to_string())?;
            format_descriptor(config, &map, &map.src)
        }
        SignKind::Multi => {
            let list = CoordinateList::parse(config.coordinates.as_deref().unwrap_or(""))?;
            let multi = service
                .multi(list.coordinates(), height, width, zoom)
                .map_err(|e| e.to_string())?;
            format_descriptor(config, &multi, &multi.src)
        }
        SignKind::Thumb => {
            let thumb = service
                .thumb(config.path.as_deref().unwrap_or(""), height, width)
                .map_err(|e| e.to_string())?;
            format_descriptor(config, &thumb, &thumb.src)
        }
    }
}

fn format_descriptor<T: Serialize>(
    config: &SignConfig,
    descriptor: &T,
    src: &str,
) -> Result<String, String> {
    let url = config.url(src);
    match config.output {
        SignOutputFormat::Url => Ok(url),
        SignOutputFormat::Json => {
            let mut json = serde_json::to_value(descriptor).map_err(|e| e.to_string())?;
            if let Some(object) = json.as_object_mut() {
                object.insert("url".to_string(), serde_json::Value::String(url));
            }
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())
        }
    }
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("imagepack Configuration Check");
    println!("═════════════════════════════");
    println!();

    match config.secret.as_deref() {
        Some(secret) => match Slugger::new(secret) {
            Ok(_) => println!("✓ Secret: valid"),
            Err(e) => {
                println!("✗ Secret: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => println!("- Secret: not set (required by serve)"),
    }

    let artifacts = DerivedImageCache::new(config.cache_dir.clone());
    match artifacts.check_writable().await {
        Ok(()) => println!("✓ Cache directory: {} is writable", config.cache_dir.display()),
        Err(e) => {
            println!("✗ Cache directory: {}", e);
            return ExitCode::FAILURE;
        }
    }

    match load_painter(config.font.as_deref()).await {
        Ok(painter) if painter.has_font() => println!("✓ Font: loaded"),
        Ok(_) => println!("✓ Font: built-in bitmap face"),
        Err(e) => {
            println!("✗ Font: {}", e);
            return ExitCode::FAILURE;
        }
    }

    println!(
        "✓ Tile server: {} ({})",
        config.tile_server.name(),
        config.tile_server.template()
    );

    if config.test_tile {
        println!();
        print!("Fetching tile 0/0/0... ");

        let fetch = FetchConfig::from_env();
        let fetcher = match HttpTileFetcher::new(fetch) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                println!("✗ failed");
                println!("  {}", e);
                return ExitCode::FAILURE;
            }
        };

        let url = config.tile_server.url(0, 0, 0);
        match fetcher.fetch(&url).await {
            Ok(body) => {
                println!("✓ success");
                println!("  Size: {} bytes", body.len());
            }
            Err(e) => {
                println!("✗ failed");
                println!();
                println!("Error: {}", e);
                println!();
                println!("Please check:");
                println!("  - The tile server template is correct");
                println!("  - The tile server is reachable from this host");
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("═════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
