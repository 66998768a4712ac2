//! lupulo-dash - live dashboard service
//!
//! Connects to the configured data source, keeps the widget set in sync with
//! the layouts and devices it announces and serves frames over HTTP and SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lupulo_common::config::{ConfigOverrides, ConfigResolver};
use lupulo_common::events::EventBus;
use lupulo_dash::source::SourceClient;
use lupulo_dash::{build_router, AppState, Dashboard, Runtime};
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const UPSTREAM_CAPACITY: usize = 1024;

/// Command-line arguments for lupulo-dash
#[derive(Parser, Debug)]
#[command(name = "lupulo-dash")]
#[command(about = "Live dashboard service for lupulo data sources")]
#[command(version)]
struct Args {
    /// Config file (overrides LUPULO_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream SSE URL
    #[arg(long, env = "LUPULO_SOURCE_URL")]
    source_url: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LUPULO_PORT")]
    port: Option<u16>,

    /// Interface to bind the HTTP API to
    #[arg(long, env = "LUPULO_BIND_HOST")]
    bind_host: Option<String>,

    /// Device to select once it is announced
    #[arg(short, long, env = "LUPULO_DEVICE")]
    device: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;
    config.apply_overrides(ConfigOverrides {
        source_url: args.source_url,
        bind_host: args.bind_host,
        port: args.port,
        default_device: args.device,
        log_level: args.log_level,
    });
    config.validate().context("Invalid configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("lupulo_dash={0},lupulo_common={0},tower_http={0}", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting lupulo-dash v{}", env!("CARGO_PKG_VERSION"));
    info!("Source: {}", config.source_url);

    let bus = Arc::new(EventBus::new(config.event_capacity));
    let dashboard = Dashboard::with_builtins().with_preferred_device(config.default_device.clone());

    let (upstream_tx, upstream_rx) = mpsc::channel(UPSTREAM_CAPACITY);
    let (runtime, runtime_task) =
        Runtime::new(dashboard, bus.clone(), config.tick_interval()).spawn(upstream_rx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let source = SourceClient::new(&config.source_url, config.reconnect_delay(), bus.clone());
    let source_task = tokio::spawn(source.run(upstream_tx, shutdown_rx));

    let app = build_router(AppState::new(bus, runtime.clone()));

    let addr = config.bind_addr();
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    runtime.shutdown().await;
    if let Err(e) = source_task.await {
        error!("Source client task failed: {}", e);
    }
    if let Err(e) = runtime_task.await {
        error!("Runtime task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
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
