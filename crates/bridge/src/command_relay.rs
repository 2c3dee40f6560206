//! Velocity command relay
//!
//! Twist messages arriving on the input topic become vehicle controls,
//! applied immediately.

use std::sync::Arc;

use contracts::{BridgeConfig, BusMessage, Envelope};
use dispatcher::{MessageBus, Subscription};
use observability::record_command_relayed;
use sim_client::SimClient;
use tracing::{debug, info, instrument, warn};

use crate::call::timed;
use crate::convert::twist_to_controls;
use crate::error::{BridgeError, Result};
use crate::shutdown::ShutdownSignal;

/// Commands relayed over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStats {
    pub applied: u64,
    pub ignored: u64,
}

pub struct CommandRelay<C> {
    client: Arc<C>,
    vehicle: String,
    subscription: Subscription,
    stats: CommandStats,
}

impl<C: SimClient> CommandRelay<C> {
    /// Subscribe to `car_control.input_topic`
    ///
    /// Messages published after this call are relayed once `run` starts.
    pub fn new(config: &BridgeConfig, client: Arc<C>, bus: &MessageBus) -> Self {
        Self {
            client,
            vehicle: config.simulator.vehicle_name.clone(),
            subscription: bus.subscribe(&config.car_control.input_topic),
            stats: CommandStats::default(),
        }
    }

    pub fn topic(&self) -> &str {
        self.subscription.topic()
    }

    /// Take API control, then relay until shutdown
    #[instrument(name = "command_relay_run", skip(self, shutdown), fields(topic = %self.subscription.topic()))]
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<CommandStats> {
        timed(
            "enableApiControl",
            self.client.enable_api_control(true, &self.vehicle),
        )
        .await?;
        info!("API control enabled, relaying velocity commands");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                envelope = self.subscription.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await?,
                    None => {
                        return Err(BridgeError::BusClosed {
                            topic: self.subscription.topic().to_string(),
                        })
                    }
                },
            }
        }

        info!(applied = self.stats.applied, ignored = self.stats.ignored, "command relay stopped");
        Ok(self.stats)
    }

    async fn handle(&mut self, envelope: Envelope) -> Result<()> {
        let BusMessage::Twist(twist) = &envelope.message else {
            warn!(
                kind = envelope.message.kind(),
                seq = envelope.seq,
                "non-twist message on command topic ignored"
            );
            self.stats.ignored += 1;
            return Ok(());
        };

        let controls = twist_to_controls(twist);
        debug!(
            throttle = controls.throttle,
            steering = controls.steering,
            reverse = controls.is_manual_gear,
            "applying car controls"
        );
        timed(
            "setCarControls",
            self.client.set_car_controls(&controls, &self.vehicle),
        )
        .await?;

        record_command_relayed(controls.is_manual_gear);
        self.stats.applied += 1;
        Ok(())
    }
}
