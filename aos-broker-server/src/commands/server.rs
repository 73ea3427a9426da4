use std::sync::Arc;

use anyhow::Result;

use crate::api::{self, AppState};
use crate::config::Config;

pub async fn run_server(port: Option<u16>) -> Result<()> {
    let config = Config::load()?;
    let port = port.unwrap_or(config.server_port);
    let addr = format!("{}:{}", config.server_host, port);

    tracing::info!("Starting AOS broker");
    tracing::info!("  AOS endpoint: {}", config.aos_endpoint);
    tracing::info!("  Request timeout: {:?}", config.aos_timeout);

    let state = AppState {
        driver: Arc::new(super::build_driver(&config)?),
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutting down...");
    };

    api::start_server(&addr, state, shutdown).await
}
