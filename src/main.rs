use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitalboard::api::RestApi;
use vitalboard::config::{load_config, CONFIG_PATH_ENV};
use vitalboard::{Aggregator, DashboardError, DriftTask, FhirClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vitalboard=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), DashboardError> {
    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"));
    let config = load_config(&config_path)?;

    let client = FhirClient::new(&config.fhir)?;
    let aggregator = Arc::new(Aggregator::new(Arc::new(client)));

    let drift = DriftTask::spawn(Arc::clone(&aggregator), config.drift.interval());
    let api = RestApi::new(Arc::clone(&aggregator));

    let listen = format!("{}:{}", config.api.host, config.api.port);
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| DashboardError::Address(format!("{} ({})", listen, e)))?;

    // Create a channel for shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let (bound, server) = warp::serve(api.routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            info!("Shutting down server...");
        })?;

    info!("Dashboard API listening on http://{}", bound);
    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("Ctrl+C received, starting graceful shutdown");

    shutdown_tx.send(()).ok();
    server_handle.await?;

    drift.stop().await;
    info!("Shutdown complete");
    Ok(())
}
