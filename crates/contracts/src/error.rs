//! Errors shared across crates: configuration and sink delivery
//!
//! Simulator and bridge failures have their own error types in
//! `sim_client` and `bridge`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    /// The config text could not be decoded
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The config decoded but breaks a rule; `field` is a dotted path
    #[error("invalid config at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("sink '{sink_name}' failed to write: {message}")]
    SinkWrite { sink_name: String, message: String },

    #[error("sink '{sink_name}' could not connect: {message}")]
    SinkConnection { sink_name: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink.into(),
            message: message.into(),
        }
    }
}
