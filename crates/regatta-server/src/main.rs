//! Main entry point for the Regatta node.

use clap::Parser;
use tracing::info;

use regatta_server::{Cli, RegattaNode, ServerConfig, metrics, startup};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let configuration = ServerConfig::load(&cli)?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;
    info!(
        config_file = %cli.config.display(),
        data_dir = %configuration.data_dir,
        "Starting Regatta"
    );

    let exporter_address = if configuration.metrics.enabled {
        Some(configuration.metrics_socket_addr()?)
    } else {
        None
    };
    metrics::init_metrics(exporter_address)?;

    // Subscribe before anything slow so an early signal is not lost
    let shutdown_signal = startup::wait_for_shutdown_signal();

    let node = RegattaNode::start(&configuration).await?;

    shutdown_signal.wait().await;
    node.shutdown(configuration.shutdown_timeout()).await;

    info!("Regatta stopped");
    Ok(())
}
