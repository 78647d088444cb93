use anyhow::{Context, Result};
use log::{error, info};
use sheetlink_core::{InMemoryMetrics, LinkService};
use std::sync::Arc;
use tokio::net::TcpListener;

mod config;
mod routes;

use config::WebConfig;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = WebConfig::from_env().context("Failed to load configuration")?;
    let addr = config.bind_address()?;
    let ttl = config.processing.template_cache_ttl();

    let state = Arc::new(AppState {
        service: LinkService::new(config.processing, Arc::new(InMemoryMetrics::new())),
    });

    // expired templates are otherwise only dropped when read
    let purge_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl);
        loop {
            interval.tick().await;
            purge_state.service.purge_template_cache();
        }
    });

    let app = routes::router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
