//! Metrics initialization for the Regatta server
//!
//! Metric names and recording helpers live next to the code that records them
//! (`regatta_consistency::metrics`); this module only installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Install the Prometheus exporter, if configured, and describe all metrics
///
/// Descriptions are registered after the recorder so they reach the exporter.
pub fn init_metrics(exporter_address: Option<SocketAddr>) -> anyhow::Result<()> {
    if let Some(address) = exporter_address {
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
        info!(address = %address, "Prometheus exporter listening");
    }

    regatta_consistency::metrics::describe_metrics();
    Ok(())
}
