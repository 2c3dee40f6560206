//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Failed to load configuration from {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: contracts::ContractError,
    },

    /// Simulator connection error
    #[cfg_attr(not(feature = "airsim-rpc"), allow(dead_code))]
    #[error("Failed to connect to simulator at {host}:{port}: {source}")]
    SimulatorConnection {
        host: String,
        port: u16,
        #[source]
        source: sim_client::SimError,
    },

    /// Live client requested in a build without it
    #[cfg_attr(feature = "airsim-rpc", allow(dead_code))]
    #[error("this build has no live simulator client; rebuild with the `airsim-rpc` feature or pass --mock")]
    LiveClientUnavailable,

    /// Bridge stopped with an error
    #[error(transparent)]
    Bridge(#[from] bridge::BridgeError),

    /// Dispatcher or ingress setup failed
    #[error(transparent)]
    Dispatcher(#[from] dispatcher::DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config(path: impl Into<String>, source: contracts::ContractError) -> Self {
        Self::Config {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
