//! The sensord binary: host process for sensor-panel plugins.

use clap::Parser;
use rust_sensord::config::HostConfig;
use rust_sensord::plugins::{PluginMonitor, SystemMetricsPlugin};
use rust_sensord::registry::SensorRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sensord", about = "A modular sensor-panel plugin host")]
struct Cli {
    /// Path to the host configuration file
    #[arg(short, long, default_value = "sensord.toml")]
    config: PathBuf,

    /// Discover plugins, print them with their registry entries, and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(HostConfig::load_from(&cli.config)?);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.host.log_level)),
        )
        .init();

    let registry = Arc::new(SensorRegistry::new());
    let mut monitor = PluginMonitor::new(config.clone(), registry.clone());

    monitor.register_builtin(Box::new(SystemMetricsPlugin::new(
        config.plugins.sensor_window,
    )));

    monitor.discover()?;
    let started = monitor.start_all().await;
    info!(
        packages = monitor.descriptors().len(),
        started, "Plugin startup complete"
    );

    if cli.list {
        for descriptor in monitor.descriptors() {
            println!(
                "{} ({})",
                descriptor.folder_name(),
                descriptor.binary_path().display()
            );
            for wrapper in descriptor.wrappers() {
                println!(
                    "  {} [{}] running={}",
                    wrapper.name(),
                    wrapper.plugin_id(),
                    wrapper.is_running()
                );
            }
        }
        for reading in registry.snapshot() {
            println!("{}  {}", reading.address, reading.entry.display_value());
        }
        monitor.shutdown().await;
        return Ok(());
    }

    monitor.start_polling();
    info!("sensord running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    // Capture deactivation state before teardown stops everything.
    if let Err(e) = monitor.persist_deactivated() {
        warn!(error = %e, "Failed to persist deactivation state");
    }
    monitor.shutdown().await;

    Ok(())
}
