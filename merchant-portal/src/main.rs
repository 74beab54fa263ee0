use dotenvy::dotenv;
use merchant_portal::config::get_configuration;
use merchant_portal::startup::{build_router, spawn_housekeeping};
use merchant_portal::AppState;
use portal_core::observability::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("merchant-portal", &configuration.telemetry)?;

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    info!(
        backend = %configuration.backend.base_url,
        poll_interval_secs = configuration.polling.interval_secs,
        "Configuration loaded"
    );

    let state = AppState::new(configuration)
        .map_err(|e| anyhow::anyhow!("Failed to build application state: {}", e))?;

    let shutdown = CancellationToken::new();
    spawn_housekeeping(&state, shutdown.clone());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting merchant-portal on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            anyhow::anyhow!("Server error: {}", e)
        })?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
