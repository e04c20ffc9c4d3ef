//! Reanalysis API Server
//!
//! Vertical atmospheric profiles from the ERA5 pressure-level and
//! model-level archives.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use reanalysis_api::config::ApiConfig;
use reanalysis_api::state::AppState;

/// Reanalysis API Server
#[derive(Parser, Debug)]
#[command(name = "reanalysis-api")]
#[command(about = "Vertical profile server for ERA5 reanalysis archives")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8084", env = "REANALYSIS_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "REANALYSIS_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// Upper bound on threads running archive fetches
    #[arg(long, env = "REANALYSIS_MAX_BLOCKING_THREADS")]
    max_blocking_threads: Option<usize>,

    /// YAML configuration file
    #[arg(short, long, env = "REANALYSIS_CONFIG")]
    config: Option<PathBuf>,
}

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }
    if let Some(threads) = args.max_blocking_threads {
        runtime_builder.max_blocking_threads(threads);
    }

    let runtime = match runtime_builder.build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_server(args)) {
        error!("Server exited with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    info!("Starting reanalysis API server");

    let config = ApiConfig::load(args.config.as_deref())?;
    info!(
        isobaric = %config.isobaric.url,
        native = %config.native.url,
        pool_size = config.isobaric.pool_size,
        "Configuration loaded"
    );

    // Pools open before the listener binds; remote opens block on the runtime.
    let state = tokio::task::spawn_blocking(move || AppState::initialize(&config, Some(prometheus)))
        .await
        .context("Startup task failed")?
        .context("Failed to initialize application state")?;
    let state = Arc::new(state);

    let app = reanalysis_api::router(Arc::clone(&state));

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.listen))?;

    info!("Reanalysis API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing dataset pools");
    tokio::task::spawn_blocking(move || state.shutdown()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
