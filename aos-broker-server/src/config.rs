use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use aos_broker_lifecycle::AosConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub aos_endpoint: String,
    /// Suffix appended to dashboard URLs, e.g. `/console`
    pub service_uri: String,
    pub server_host: String,
    pub server_port: u16,
    pub aos_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let timeout_secs: u64 = std::env::var("AOS_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("AOS_TIMEOUT_SECS must be a number of seconds")?;

        Ok(Self {
            aos_endpoint: std::env::var("AOS_ENDPOINT")
                .context("AOS_ENDPOINT must be set")?,
            service_uri: std::env::var("SERVICE_URI")
                .unwrap_or_default(),
            server_host: std::env::var("BROKER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("BROKER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("BROKER_PORT must be a valid port number")?,
            aos_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn aos(&self) -> AosConfig {
        AosConfig {
            endpoint: self.aos_endpoint.clone(),
            timeout: self.aos_timeout,
        }
    }
}

/// `BROKER_LOG_DIR`, or `~/.aos-broker`. Read before `Config::load` so
/// logging is up for every subcommand.
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BROKER_LOG_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".aos-broker")
}
