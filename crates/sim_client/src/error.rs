//! Sim Client error types

use thiserror::Error;

/// Simulator client error
#[derive(Debug, Error)]
pub enum SimError {
    /// Connection could not be established or confirmed
    #[error("failed to connect to simulator at {addr}: {message}")]
    ConnectionFailed { addr: String, message: String },

    /// Call issued before the connection was confirmed (or after it was lost)
    #[error("simulator client is not connected")]
    NotConnected,

    /// Server closed the connection mid-call
    #[error("simulator closed the connection during '{method}'")]
    ConnectionClosed { method: String },

    /// Request could not be encoded
    #[error("failed to encode '{method}' request: {message}")]
    Encode { method: String, message: String },

    /// Result did not match the expected shape
    #[error("failed to decode '{method}' result: {message}")]
    Decode { method: String, message: String },

    /// Server reported an error for the call
    #[error("simulator rejected '{method}': {message}")]
    Rpc { method: String, message: String },

    /// Malformed msgpack-rpc frame
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failure injected by the mock client
    #[error("injected failure for '{method}'")]
    Injected { method: String },

    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub fn encode(method: &str, message: impl ToString) -> Self {
        Self::Encode {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    pub fn decode(method: &str, message: impl ToString) -> Self {
        Self::Decode {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    pub fn rpc(method: &str, message: impl Into<String>) -> Self {
        Self::Rpc {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Whether the underlying connection is unusable after this error
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectionClosed { .. } | Self::Protocol(_)
        )
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SimError>;
