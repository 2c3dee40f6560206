//! Bridge service
//!
//! Confirms the simulator connection, then runs the poll loop with the
//! enabled relays beside it. The first failure anywhere stops everything.

use std::sync::Arc;

use contracts::BridgeConfig;
use dispatcher::MessageBus;
use observability::BridgeMetricsAggregator;
use sim_client::SimClient;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::call::timed;
use crate::command_relay::{CommandRelay, CommandStats};
use crate::error::{BridgeError, Result};
use crate::poll_loop::PollLoop;
use crate::pose_relay::PoseRelay;
use crate::shutdown::{Shutdown, ShutdownSignal};

/// Outcome of a completed run
#[derive(Debug, Clone, Default)]
pub struct BridgeReport {
    pub poll: BridgeMetricsAggregator,
    /// `None` when car control is disabled
    pub commands: Option<CommandStats>,
    /// Transforms rebroadcast from pose overrides (`None` when pose is disabled)
    pub transforms_relayed: Option<u64>,
}

enum RelayOutcome {
    Commands(CommandStats),
    Transforms(u64),
}

pub struct Bridge<C> {
    config: BridgeConfig,
    client: Arc<C>,
    bus: MessageBus,
}

impl<C: SimClient + 'static> Bridge<C> {
    pub fn new(config: BridgeConfig, client: Arc<C>, bus: MessageBus) -> Self {
        Self {
            config,
            client,
            bus,
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Run until `shutdown`, `max_ticks`, or the first error
    pub async fn run(self, shutdown: ShutdownSignal, max_ticks: Option<u64>) -> Result<BridgeReport> {
        let simulator = &self.config.simulator;
        timed(
            "ping",
            self.client.confirm_connection(&simulator.client_name),
        )
        .await?;
        info!(
            host = %simulator.host,
            port = simulator.port,
            vehicle = %simulator.vehicle_name,
            "simulator connection confirmed"
        );

        // Relays subscribe before the loop publishes anything
        let poll = PollLoop::new(&self.config, Arc::clone(&self.client), &self.bus);
        let relay_stop = Shutdown::new();
        let mut relays = JoinSet::new();

        if self.config.car_control.active {
            let relay = CommandRelay::new(&self.config, Arc::clone(&self.client), &self.bus);
            let signal = relay_stop.signal();
            relays.spawn(async move { relay.run(signal).await.map(RelayOutcome::Commands) });
        }
        if self.config.pose.active {
            let relay = PoseRelay::new(&self.config, &self.bus);
            let signal = relay_stop.signal();
            relays.spawn(async move { relay.run(signal).await.map(RelayOutcome::Transforms) });
        }

        let mut report = BridgeReport::default();
        let poll_run = poll.run(shutdown, max_ticks);
        tokio::pin!(poll_run);

        let poll_result = loop {
            tokio::select! {
                result = &mut poll_run => break result,
                Some(joined) = relays.join_next() => {
                    // a relay only returns early on failure
                    let outcome = flatten(joined).inspect_err(|e| error!(error = %e, "relay failed"))?;
                    record_outcome(&mut report, outcome);
                }
            }
        };

        relay_stop.trigger();
        while let Some(joined) = relays.join_next().await {
            record_outcome(&mut report, flatten(joined)?);
        }

        report.poll = poll_result?;
        info!(
            ticks = report.poll.ticks,
            images = report.poll.images_published,
            "bridge stopped"
        );
        Ok(report)
    }
}

fn flatten(
    joined: std::result::Result<Result<RelayOutcome>, tokio::task::JoinError>,
) -> Result<RelayOutcome> {
    joined.map_err(|e| BridgeError::Task {
        task: "relay",
        message: e.to_string(),
    })?
}

fn record_outcome(report: &mut BridgeReport, outcome: RelayOutcome) {
    match outcome {
        RelayOutcome::Commands(stats) => report.commands = Some(stats),
        RelayOutcome::Transforms(count) => report.transforms_relayed = Some(count),
    }
}
