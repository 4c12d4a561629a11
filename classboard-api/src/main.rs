//! classboard-api - Student schedule service
//!
//! Reads class schedules out of uploaded images with a hosted vision model,
//! keeps classes, notes and reminders in the hosted store, and serves the
//! JSON API behind the dashboard, upload, notes and reminders pages.

use anyhow::{Context, Result};
use clap::Parser;
use classboard_common::config::{StoreBackend, TomlConfig};
use classboard_common::time::zone_offset;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use classboard_api::store::{ObjectStore, RestStore, SqliteStore, Store};
use classboard_api::vision::{GeminiClient, VisionModel};
use classboard_api::{AppState, ServiceSettings};

/// Timeout for hosted store requests
const STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Command-line arguments for classboard-api
#[derive(Parser, Debug)]
#[command(name = "classboard-api")]
#[command(about = "Student schedule service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "CLASSBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "CLASSBOARD_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(short, long, env = "CLASSBOARD_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting classboard-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    config.validate().context("Invalid configuration")?;

    let default_owner = config.owner()?;
    let zone = zone_offset(config.utc_offset_minutes)?;
    info!(owner = %default_owner, utc_offset_minutes = config.utc_offset_minutes, "Owner and campus zone");

    let (store, objects): (Arc<dyn Store>, Arc<dyn ObjectStore>) = match config.store.backend {
        StoreBackend::Hosted => {
            let url = config.store.url.as_deref().unwrap_or_default();
            let key = config.store.service_key.as_deref().unwrap_or_default();
            let rest = Arc::new(RestStore::new(url, key, STORE_TIMEOUT)?);
            info!(url, "Using hosted store");
            (rest.clone() as Arc<dyn Store>, rest as Arc<dyn ObjectStore>)
        }
        StoreBackend::Local => {
            let sqlite = Arc::new(
                SqliteStore::open(&config.store.database_path)
                    .await
                    .context("Failed to open local database")?,
            );
            info!(path = %config.store.database_path.display(), "Using local SQLite store");
            (sqlite.clone() as Arc<dyn Store>, sqlite as Arc<dyn ObjectStore>)
        }
    };

    let api_key = config.vision.api_key.as_deref().unwrap_or_default();
    let vision: Arc<dyn VisionModel> = Arc::new(GeminiClient::new(&config.vision, api_key)?);
    info!(
        model = %config.vision.model,
        structured_output = config.vision.structured_output,
        requests_per_minute = config.vision.requests_per_minute,
        "Vision model configured"
    );

    let state = AppState::new(
        store,
        objects,
        vision,
        ServiceSettings {
            default_owner,
            zone,
            uploads: config.uploads,
        },
    );
    let app = classboard_api::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

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
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
