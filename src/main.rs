use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use healthcore_server::app::build_http_app;
use healthcore_server::config::AppConfig;
use healthcore_server::db::{mirror::ReportMirror, Store};
use healthcore_server::risk::RiskModel;
use healthcore_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("healthcore_server=info")),
        )
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let store = Store::connect(&config)
        .await
        .context("Failed to initialize store")?;
    let model = RiskModel::load(&config.model_path);
    let mirror = ReportMirror::new(config.reports_csv_path.clone());
    let addr = config.bind_addr;

    let state = AppState::new(store, model, mirror, config);
    let store = state.store.clone();
    let app = build_http_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, backend = ?store.kind(), "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    store.close();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
