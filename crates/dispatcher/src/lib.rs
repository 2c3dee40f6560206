//! # Dispatcher
//!
//! Message routing module.
//!
//! Responsibilities:
//! - In-process topic bus (`MessageBus`)
//! - Fan-out of bus traffic to sinks, each behind its own queue
//! - Isolate slow sinks so they never block publishers
//! - Inbound UDP messages republished on the bus

pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod ingress;
pub mod metrics;
pub mod sinks;

pub use bus::{MessageBus, Publisher, Subscription};
pub use contracts::{DataSink, Envelope};
pub use dispatcher::{
    create_dispatcher, DispatchSummary, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use ingress::UdpIngress;
pub use metrics::{Delivery, MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, NetworkSink, NetworkSinkConfig, WireFormat};
