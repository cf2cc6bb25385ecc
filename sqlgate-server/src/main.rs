//! Standalone sqlgate server
//!
//! Serves the sqlgate JSON API over HTTP, optionally connecting to a
//! PostgreSQL database at startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, routing::get, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use sqlgate::{DatabaseGateway, GatewayOptions, PostgresGateway, SqlGateLayer};

#[derive(Parser, Debug)]
#[command(name = "sqlgate-server")]
#[command(about = "JSON administration gateway for PostgreSQL")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "SQLGATE_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Path the API is mounted under (e.g., "/db")
    #[arg(short, long, env = "SQLGATE_BASE_PATH", default_value = "")]
    base_path: String,

    /// Connect to this database at startup
    #[arg(short, long, env = "SQLGATE_DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum pooled connections per database connection
    #[arg(short = 'c', long, env = "SQLGATE_MAX_CONNECTIONS", default_value = "5")]
    max_connections: u32,

    /// Per-statement timeout in seconds; 0 disables it
    #[arg(long, env = "SQLGATE_QUERY_TIMEOUT_SECONDS", default_value = "30")]
    query_timeout_seconds: u64,
}

impl Args {
    fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            max_connections: self.max_connections,
            query_timeout: (self.query_timeout_seconds > 0)
                .then(|| Duration::from_secs(self.query_timeout_seconds)),
            ..GatewayOptions::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sqlgate=info".parse()?)
                .add_directive("sqlgate_server=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!(
        "Starting sqlgate server v{} on {}",
        env!("CARGO_PKG_VERSION"),
        args.listen
    );

    let gateway = Arc::new(PostgresGateway::new(args.gateway_options()));

    if let Some(database_url) = &args.database_url {
        gateway
            .connect(database_url)
            .await
            .context("failed to connect to the startup database")?;
    }

    // The API router carries its own state, so merge it after with_state()
    let layer = SqlGateLayer::with_shared(args.base_path.as_str(), gateway.clone());
    let base_path = layer.base_path().to_string();

    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(gateway)
        .merge(layer.into_router());

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;

    info!("Health check at http://{}/health", args.listen);
    info!("API available at http://{}{}/ping", args.listen, base_path);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Reports whether the gateway currently holds a connection
async fn health_handler(State(gateway): State<Arc<PostgresGateway>>) -> (StatusCode, &'static str) {
    if gateway.is_connected().await {
        (StatusCode::OK, "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not connected")
    }
}
