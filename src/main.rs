//! Media Library Server
//!
//! Registers local folders as video sources, browses them, streams their
//! videos with byte-range support, caches thumbnails and runs speech-to-text
//! transcription in the background.

mod config;
mod config_file;
mod error;
mod ffmpeg;
mod fs;
mod http;
#[cfg(test)]
mod integration;
mod state;
mod store;
mod stream;
mod thumbnail;
mod transcribe;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{LibraryError, Result};
use crate::http::create_router;
use crate::state::AppState;
use crate::store::MemoryStore;
use crate::thumbnail::FfmpegFrameGrabber;
use crate::transcribe::CommandEngine;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "media-library-server";

#[tokio::main]
async fn main() -> Result<()> {
    // `--generate-config [path]` writes a template and exits
    let mut args = std::env::args().skip(1);
    let first = args.next();
    if first.as_deref() == Some("--generate-config") {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        crate::config_file::generate_default_config(&path)
            .map_err(|e| LibraryError::Config(format!("cannot write {}: {}", path, e)))?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration
    let config_path = first.unwrap_or_else(|| "config.toml".to_string());
    let (config, load_error) = load_config(&config_path);

    // Initialize logging
    init_logging(&config);
    if let Some(e) = load_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }

    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    // Initialize FFmpeg
    ffmpeg::init()?;
    ffmpeg::install_log_filter();
    tracing::info!("FFmpeg version: {}", ffmpeg::version_info());
    tracing::info!("Configuration loaded: {:?}", config);

    // Create application state
    let engine = Arc::new(CommandEngine::new(
        config.transcription.engine_command.clone(),
        config.transcription.engine_args.clone(),
    ));
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(FfmpegFrameGrabber),
        engine,
    ));

    spawn_thumbnail_sweeper(state.clone());

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| LibraryError::Config(format!("bad listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Configuration from `path`, or the defaults plus the reason the file
/// could not be used. A missing file is not an error.
fn load_config(path: &str) -> (ServerConfig, Option<String>) {
    if !std::path::Path::new(path).exists() {
        return (ServerConfig::default(), None);
    }
    match crate::config_file::ConfigFile::from_file(path) {
        Ok(cf) => (cf.into_server_config(), None),
        Err(e) => (ServerConfig::default(), Some(e.to_string())),
    }
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "media_library_server={},tower_http=debug",
            config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Periodically drop thumbnails whose videos are gone
fn spawn_thumbnail_sweeper(state: Arc<AppState>) {
    let secs = state.config.thumbnails.sweep_interval_secs;
    if secs == 0 {
        tracing::info!("thumbnail sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(secs));
        loop {
            interval.tick().await;
            let s = state.clone();
            match tokio::task::spawn_blocking(move || s.sweep_thumbnails()).await {
                Ok(0) => tracing::debug!("thumbnail sweep found nothing to remove"),
                Ok(removed) => tracing::info!(removed, "removed orphaned thumbnails"),
                Err(e) => tracing::error!("thumbnail sweep panicked: {}", e),
            }
        }
    });
}
