//! Switchboard Hub Entry Point
//!
//! Loads configuration from the environment, binds the listener (the
//! only fatal failure), and serves the hub until interrupted.

use switchboard_api::{create_api_router, ApiError, ApiResult, Hub, HubConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing();

    let config = HubConfig::from_env();
    let addr = config.socket_addr()?;
    let hub = Hub::new(config);

    let app = create_api_router(hub.clone());
    switchboard_api::sweep::spawn(hub);

    tracing::info!(%addr, "Starting Switchboard hub");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }
    Ok(())
}

/// Log level comes from `SWITCHBOARD_LOG`, falling back to `RUST_LOG`,
/// then to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SWITCHBOARD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
