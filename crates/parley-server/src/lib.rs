pub mod config;
pub mod gateway;
pub mod logging;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parley_api::{AppState, AppStateInner};
use parley_db::Database;
use parley_gateway::Hub;
use parley_gateway::heartbeat;

use crate::config::Config;

/// REST routes plus the `/ws` gateway, sharing one state.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(parley_api::router(state.clone()))
        .merge(gateway::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Open storage, start the heartbeat and the hub, and return the state the
/// routes run on.
pub fn init_state(config: &Config) -> anyhow::Result<AppState> {
    if config.uses_placeholder_secret() {
        warn!("PARLEY_JWT_SECRET is unset or a placeholder; do not run like this in production");
    }

    let db = Database::open(&config.db_path)?;
    let hub = Hub::new(config.hub.clone());
    tokio::spawn(heartbeat::run_heartbeat_loop(
        hub.clone(),
        config.hub.heartbeat_interval,
    ));

    Ok(Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        hub,
    }))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = init_state(&config)?;
    let app = build_app(state);

    let addr = config.addr()?;
    info!("Parley listening on {}", addr);
    info!(
        "Heartbeat every {}s, typing timeout {}ms",
        config.hub.heartbeat_interval.as_secs(),
        config.hub.typing_timeout.as_millis()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
