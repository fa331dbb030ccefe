//! Automatic Lighting Server
//!
//! Runs a host instance with the automatic lighting integration loaded.
//! The config directory comes from the first argument or `AL_CONFIG_DIR`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use automatic_lighting::{AutomaticLighting, HomeAssistant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_DIR_ENV: &str = "AL_CONFIG_DIR";

fn config_dir() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_DIR_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_dir = config_dir();
    info!("Starting automatic lighting host in {}", config_dir.display());

    let hass = Arc::new(HomeAssistant::new(&config_dir));
    hass.config_entries
        .load()
        .await
        .with_context(|| format!("loading config entries from {}", config_dir.display()))?;

    let integration = AutomaticLighting::async_setup(hass.clone());

    for result in hass.config_entries.setup_all().await {
        if let Err(err) = result {
            warn!("Config entry setup failed: {}", err);
        }
    }
    info!(
        "Loaded {} of {} config entries",
        integration.entity_count(),
        hass.config_entries.len()
    );

    info!("Automatic lighting host is running");

    // Keep the server running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    Ok(())
}
