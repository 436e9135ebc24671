use anyhow::{Result, Context};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use gridpulse::api;
use gridpulse::config::MonitorConfig;
use gridpulse::engine::HealthMonitor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = "config.json";
    let config_content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path))?;
    let config: MonitorConfig = serde_json::from_str(&config_content)
        .with_context(|| "Failed to parse config")?;

    let monitor = Arc::new(HealthMonitor::new(config.clone())?);
    info!("Watching {} admin API endpoints", monitor.targets().len());

    let api_port = config.api_port;
    {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move {
            api::start_server(api_port, monitor).await;
        });
    }

    let _sweeper = monitor.start_periodic(Duration::from_millis(config.check_interval_ms));

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Closing GridPulse monitor...");
    monitor.stop_periodic();

    Ok(())
}
