//! Folio consent service (folio-consent) - Main entry point
//!
//! Restores the visitor's consent decision, attaches the interaction tracker
//! and serves the consent API and event stream.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use folio_common::config::{
    config_file_path, load_toml_config_or_default, write_toml_config, LoggingConfig,
    RootFolderInitializer, ServiceConfig,
};
use folio_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio_consent::sink::{spawn_forwarder, BusSink, ChannelSink, FanoutSink, TracingSink};
use folio_consent::tracker::ClickStream;
use folio_consent::{create_router, AppState, ConsentService, FileStore, InteractionTracker};

const MODULE_NAME: &str = "folio-consent";

/// Command-line arguments for folio-consent
#[derive(Parser, Debug)]
#[command(name = "folio-consent")]
#[command(about = "Cookie consent and interaction tracking service for Folio")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "FOLIO_PORT")]
    port: Option<u16>,

    /// Data folder holding the consent store
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (overrides FOLIO_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the resolved settings as a config file to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config_file_path);
    let toml = load_toml_config_or_default(config_path.as_deref());
    let config = ServiceConfig::resolve(MODULE_NAME, toml, args.port, args.root_folder);

    if let Some(path) = &args.write_config {
        write_toml_config(&config.to_toml(), path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Wrote config to {}", path.display());
        return Ok(());
    }

    init_tracing(&config.logging)?;

    info!(
        "Starting Folio consent service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    info!("Root folder: {}", config.root_folder.display());

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let events = EventBus::new(100);
    let store = Arc::new(FileStore::new(initializer.store_path()));
    let (consent, outcome) = ConsentService::load(store, config.storage_key.clone());
    let consent = Arc::new(consent.with_events(events.clone()));
    info!(
        "Consent restored from '{}' ({:?})",
        consent.storage_key(),
        outcome
    );

    let mut sink = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(BusSink::new(events.clone())));
    let forwarder = match config.analytics.endpoint.clone() {
        Some(endpoint) => {
            let (channel, rx) = ChannelSink::new(config.analytics.queue_capacity);
            sink = sink.with(Arc::new(channel));
            Some(spawn_forwarder(endpoint, rx))
        }
        None => {
            info!("No analytics endpoint configured; tracked clicks are logged only");
            None
        }
    };

    let clicks = ClickStream::new();
    let tracker = InteractionTracker::attach(&clicks, consent.clone(), Arc::new(sink));

    let app = create_router(
        AppState {
            consent,
            clicks,
            events,
        },
        config.server.allowed_origin.as_deref(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Detaching drops the last channel sender, letting the forwarder drain
    tracker.detach();
    if let Some(forwarder) = forwarder {
        if let Err(e) = forwarder.await {
            warn!("Analytics forwarder ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// RUST_LOG wins; otherwise the configured level for this crate and tower_http
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "folio_consent={level},folio_common={level},tower_http={level}",
            level = logging.level
        ))
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
