//! Pose override relay
//!
//! Poses arriving on the override topic are rebroadcast as the
//! `pose.frame_id -> imu.frame_id` transform.

use contracts::{BridgeConfig, BusMessage, Header, Stamp};
use dispatcher::{MessageBus, Publisher, Subscription};
use observability::record_transform_relayed;
use tracing::{info, instrument, warn};

use crate::convert::transform_from_pose;
use crate::error::{BridgeError, Result};
use crate::poll_loop::publish;
use crate::shutdown::ShutdownSignal;

pub struct PoseRelay {
    parent_frame_id: String,
    child_frame_id: String,
    subscription: Subscription,
    transform: Publisher,
    relayed: u64,
}

impl PoseRelay {
    pub fn new(config: &BridgeConfig, bus: &MessageBus) -> Self {
        Self {
            parent_frame_id: config.pose.frame_id.clone(),
            child_frame_id: config.imu.frame_id.clone(),
            subscription: bus.subscribe(&config.pose.override_topic),
            transform: bus.advertise(&config.pose.transform_topic),
            relayed: 0,
        }
    }

    /// Relay until shutdown; returns the number of transforms published
    #[instrument(name = "pose_relay_run", skip(self, shutdown), fields(topic = %self.subscription.topic()))]
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<u64> {
        loop {
            let envelope = tokio::select! {
                _ = shutdown.wait() => break,
                envelope = self.subscription.recv() => envelope,
            };
            let Some(envelope) = envelope else {
                return Err(BridgeError::BusClosed {
                    topic: self.subscription.topic().to_string(),
                });
            };

            match envelope.message {
                BusMessage::PoseStamped(pose) => {
                    let header = Header::new(Stamp::now(), &self.parent_frame_id);
                    let transform = transform_from_pose(header, &self.child_frame_id, &pose.pose);
                    publish(&self.transform, BusMessage::TransformStamped(transform));
                    record_transform_relayed();
                    self.relayed += 1;
                }
                other => warn!(kind = other.kind(), "non-pose message on override topic ignored"),
            }
        }

        info!(relayed = self.relayed, "pose relay stopped");
        Ok(self.relayed)
    }
}
