//! # Bridge
//!
//! Polls the simulator and republishes its sensors on the message bus.
//!
//! - [`PollLoop`]: IMU-rate loop with a nested image/LIDAR sub-tick
//! - [`CommandRelay`]: velocity commands -> vehicle controls
//! - [`PoseRelay`]: pose overrides -> transform broadcasts
//! - [`Bridge`]: connection check plus all of the above as one run
//!
//! The request batch and the response-slot table are both derived in
//! [`layout`], and every frame conversion lives in [`convert`].

mod call;
pub mod command_relay;
pub mod convert;
pub mod error;
pub mod layout;
pub mod modality;
pub mod poll_loop;
pub mod pose_relay;
pub mod service;
pub mod shutdown;

pub use command_relay::{CommandRelay, CommandStats};
pub use error::{BridgeError, Result};
pub use layout::{build_requests, expected_types, CameraSlots, ResponseLayout};
pub use poll_loop::{LidarVariant, PollLoop};
pub use pose_relay::PoseRelay;
pub use service::{Bridge, BridgeReport};
pub use shutdown::{Shutdown, ShutdownSignal};
