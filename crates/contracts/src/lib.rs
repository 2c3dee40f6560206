//! # Contracts
//!
//! Shared interface contracts between the bridge crates.
//! All business crates depend on this crate; reverse dependencies are prohibited.
//!
//! ## Frames
//! - `sim` types are in the simulator's NED frame, exactly as the RPC server sends them
//! - `message` types are in the right-handed output frame published on the bus

mod config;
mod error;
mod message;
mod report;
mod sim;
mod sink;

pub use config::*;
pub use error::*;
pub use message::*;
pub use report::*;
pub use sim::*;
pub use sink::*;
