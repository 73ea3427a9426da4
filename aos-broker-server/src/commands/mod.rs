pub mod instance;
pub mod server;

use anyhow::{Context, Result};
use aos_broker_lifecycle::{AosClient, LifecycleDriver};

use crate::config::Config;

/// Driver built from the environment configuration
pub(crate) fn build_driver(config: &Config) -> Result<LifecycleDriver> {
    let client = AosClient::new(config.aos()).context("Failed to build AOS HTTP client")?;
    Ok(LifecycleDriver::new(client, config.service_uri.clone()))
}
