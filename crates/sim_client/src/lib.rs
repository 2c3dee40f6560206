//! # Sim Client
//!
//! Simulator client module.
//!
//! Responsibilities:
//! - Define the `SimClient` abstraction used by the poll loop and the relays
//! - Talk to a live simulator over msgpack-rpc
//! - Provide a scriptable mock for tests and offline runs
//!
//! ## Feature Flags
//!
//! - `airsim-rpc`: Enable the msgpack-rpc client (rmp-serde / rmpv)

pub mod client;
pub mod error;
pub mod mock_client;

#[cfg(feature = "airsim-rpc")]
pub mod airsim_client;
#[cfg(feature = "airsim-rpc")]
pub mod rpc;

pub use client::SimClient;
pub use error::{Result, SimError};
pub use mock_client::{MockConfig, MockSimClient};

#[cfg(feature = "airsim-rpc")]
pub use airsim_client::AirSimClient;
