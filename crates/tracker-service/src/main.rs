//! Tracker Service - HTTP listener for tracker uplinks.
//!
//! Run with: `cargo run -p tracker-service`

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;

use tracker_service::{AppState, Config, api};
use tracker_store::Store;

/// Tracker Service - stores uplinks posted by the network relay.
#[derive(Parser, Debug)]
#[command(name = "tracker-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tracker_service=info".parse()?)
                .add_directive("tracker_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    config.validate()?;

    let store = if config.storage.create_if_missing {
        Store::open_or_create(&config.storage.path)?
    } else {
        Store::open(&config.storage.path)?
    };

    let addr: SocketAddr = config.server.bind.parse()?;
    info!(
        "Acknowledging uplinks with {:?} ({:?} policy)",
        config.server.ack_body, config.ingest.ack_policy
    );

    let state = AppState::new(store, config);
    let app = api::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
