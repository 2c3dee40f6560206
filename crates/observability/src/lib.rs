//! # Observability
//!
//! Tracing and Prometheus metrics.
//!
//! ## Features
//!
//! - Tracing subscriber init (JSON / Pretty / Compact)
//! - Prometheus exporter
//! - Bridge metrics recorders and a run aggregator
//!
//! ## Example
//!
//! ```ignore
//! observability::init_tracing(LogFormat::Compact, "info")?;
//! observability::init_metrics_only(9000)?;
//!
//! let report = poll_loop.tick().await?;
//! observability::record_tick_metrics(&report);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-exports
pub use crate::metrics::{
    record_client_call, record_command_relayed, record_message_published, record_sink_totals,
    record_tick_metrics, record_transform_relayed, BridgeMetricsAggregator, BridgeMetricsSummary,
    RunningStats, StatsSummary,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Multi-line, human readable
    Pretty,
    /// Single line
    Compact,
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(format: LogFormat, default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };
    installed.context("Failed to initialize tracing subscriber")
}

/// Install the Prometheus exporter on `0.0.0.0:port`
///
/// Tracing is set up separately, before the config is even loaded.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_subscriber_is_rejected() {
        let first = init_tracing(LogFormat::Compact, "warn");
        let second = init_tracing(LogFormat::Json, "warn");
        // Another test in this binary may have installed one first
        assert!(first.is_err() || second.is_err());
        assert!(matches!(LogFormat::default(), LogFormat::Json));
    }

    #[test]
    fn test_recorders_without_exporter_are_noops() {
        let report = contracts::TickReport {
            tick: 1,
            image_subtick: true,
            ..Default::default()
        };
        record_tick_metrics(&report);
        record_message_published("airsim/imu", "imu");
        record_client_call("getImuData", 0.4, true);
    }
}
