//! Dispatcher errors
//!
//! Write failures never surface here: a sink worker logs and counts them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be started
    #[error("sink '{name}' could not be started: {message}")]
    SinkCreation { name: String, message: String },

    /// The ingress socket could not be bound
    #[error("ingress could not listen on '{addr}': {message}")]
    Ingress { addr: String, message: String },

    /// Ingress socket failure after binding
    #[error("ingress socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn ingress(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ingress {
            addr: addr.into(),
            message: message.into(),
        }
    }
}
