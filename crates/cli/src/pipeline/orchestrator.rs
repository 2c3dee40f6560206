//! Pipeline orchestrator - coordinates all components.
//!
//! Bus, dispatcher and optional UDP ingress are the same in every mode; only
//! the simulator client differs (`--mock` or the live msgpack-rpc client).

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bridge::{Bridge, Shutdown, ShutdownSignal};
use contracts::BridgeConfig;
use dispatcher::{MessageBus, UdpIngress};
use observability::record_sink_totals;
use sim_client::{MockConfig, MockSimClient, SimClient};
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// How long sinks get to drain after the bridge stops
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated bridge configuration (CLI overrides applied)
    pub bridge: BridgeConfig,

    /// Stop after this many ticks (None = unlimited)
    pub max_ticks: Option<u64>,

    /// Stop after this long (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Use the mock simulator client
    pub mock: bool,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown`, the tick limit, the timeout, or a fatal error
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<PipelineStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        if self.config.mock {
            info!("Running in MOCK mode (no simulator required)");
            let geometry = self.config.bridge.camera_geometry;
            let client = MockSimClient::with_config(MockConfig {
                image_width: geometry.width,
                image_height: geometry.height,
                ..Default::default()
            });
            return self.run_with_client(Arc::new(client), shutdown).await;
        }

        self.run_live(shutdown).await
    }

    #[cfg(feature = "airsim-rpc")]
    async fn run_live(self, shutdown: ShutdownSignal) -> Result<PipelineStats> {
        let simulator = &self.config.bridge.simulator;
        info!(
            host = %simulator.host,
            port = simulator.port,
            "Connecting to simulator..."
        );

        let client = sim_client::AirSimClient::connect(&simulator.host, simulator.port)
            .await
            .map_err(|source| CliError::SimulatorConnection {
                host: simulator.host.clone(),
                port: simulator.port,
                source,
            })?;

        self.run_with_client(Arc::new(client), shutdown).await
    }

    #[cfg(not(feature = "airsim-rpc"))]
    async fn run_live(self, _shutdown: ShutdownSignal) -> Result<PipelineStats> {
        Err(CliError::LiveClientUnavailable.into())
    }

    /// Common pipeline logic shared between mock and live modes
    async fn run_with_client<C: SimClient + 'static>(
        self,
        client: Arc<C>,
        shutdown: ShutdownSignal,
    ) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let config = self.config.bridge;
        let bus = MessageBus::from_config(&config.bus);

        // Dispatcher
        info!("Setting up dispatcher...");
        if config.sinks.is_empty() {
            warn!("No sinks configured - bus traffic stays in process");
        }
        let dispatcher = dispatcher::create_dispatcher(config.sinks.clone(), bus.tap())
            .await
            .map_err(CliError::from)
            .context("Failed to create dispatcher")?;
        let active_sinks = dispatcher.sink_count();
        let dispatcher_stop = Shutdown::new();
        let mut stop_signal = dispatcher_stop.signal();
        let dispatcher_handle =
            dispatcher.spawn_until(async move { stop_signal.wait().await });
        info!(active_sinks, "Dispatcher started");

        // Inbound messages
        let ingress_handle = match &config.bus.ingress_addr {
            Some(addr) => {
                let ingress = UdpIngress::bind(addr, bus.clone())
                    .await
                    .map_err(CliError::from)?;
                Some(ingress.spawn())
            }
            None => None,
        };

        // Stop on external signal or timeout
        let bridge_stop = Shutdown::new();
        let bridge_signal = bridge_stop.signal();
        let timeout = self.config.timeout;
        let mut external = shutdown;
        let watcher = tokio::spawn(async move {
            match timeout {
                Some(limit) => {
                    tokio::select! {
                        _ = external.wait() => {}
                        _ = tokio::time::sleep(limit) => {
                            warn!(timeout_secs = limit.as_secs(), "Bridge timed out");
                        }
                    }
                }
                None => external.wait().await,
            }
            bridge_stop.trigger();
        });

        let result = Bridge::new(config, client, bus)
            .run(bridge_signal, self.config.max_ticks)
            .await;
        watcher.abort();

        // Shutdown
        info!("Shutting down pipeline...");
        if let Some(handle) = ingress_handle {
            handle.abort();
        }
        dispatcher_stop.trigger();
        let dispatch = match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(summary)) => {
                for (sink, snapshot) in &summary.sinks {
                    record_sink_totals(
                        sink,
                        snapshot.write_count,
                        snapshot.failure_count,
                        snapshot.dropped_count,
                    );
                }
                Some(summary)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                None
            }
            Err(_) => {
                warn!("Dispatcher did not drain in time");
                None
            }
        };

        let report = result.map_err(CliError::from)?;
        let stats = PipelineStats {
            report,
            dispatch,
            active_sinks,
            duration: start_time.elapsed(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            tick_rate = format!("{:.2}", stats.tick_rate()),
            "Pipeline shutdown complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::collections::HashMap;

    fn mock_pipeline(base: &std::path::Path, max_ticks: u64) -> Pipeline {
        let mut bridge = BridgeConfig::default();
        bridge.camera_geometry.width = 8;
        bridge.camera_geometry.height = 6;
        bridge.rates.rate = 50;
        bridge.bus.tap_capacity = 1024;
        bridge.sinks.push(SinkConfig {
            name: "files".into(),
            sink_type: SinkType::File,
            queue_capacity: 1024,
            params: HashMap::from([("base_path".to_string(), base.display().to_string())]),
        });

        Pipeline::new(PipelineConfig {
            bridge,
            max_ticks: Some(max_ticks),
            timeout: None,
            metrics_port: None,
            mock: true,
        })
    }

    #[tokio::test]
    async fn test_mock_run_to_tick_limit() {
        let dir = tempfile::tempdir().unwrap();
        let stats = mock_pipeline(dir.path(), 4)
            .run(ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(stats.report.poll.ticks, 4);
        assert_eq!(stats.report.poll.image_subticks, 2);
        assert_eq!(stats.active_sinks, 1);

        let dispatch = stats.dispatch.unwrap();
        assert!(dispatch.envelopes > 0);
        assert_eq!(dispatch.sinks[0].1.failure_count, 0);
        assert!(dir.path().join("airsim/imu/1.json").exists());
        assert!(dir.path().join("airsim/rgb/image/1.png").exists());
    }

    #[tokio::test]
    async fn test_timeout_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = mock_pipeline(dir.path(), 0);
        pipeline.config.max_ticks = None;
        pipeline.config.timeout = Some(Duration::from_millis(100));

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.run(ShutdownSignal::never()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(stats.report.poll.ticks > 0);
    }
}
