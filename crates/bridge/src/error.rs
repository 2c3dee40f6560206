//! Bridge error types

use thiserror::Error;

/// Errors that stop the poll loop or a relay
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Simulator call failed
    #[error(transparent)]
    Sim(#[from] sim_client::SimError),

    /// `sim_get_images` returned fewer responses than requested
    #[error("image batch returned {actual} responses, layout requires {expected}")]
    ShortResponseBatch { expected: usize, actual: usize },

    /// Sensor buffer does not fit the configured geometry
    #[error("'{source_name}' buffer has {actual} {unit}, expected {expected}")]
    BufferSize {
        source_name: String,
        expected: usize,
        actual: usize,
        unit: &'static str,
    },

    /// Quaternion with zero norm has no inverse
    #[error("degenerate quaternion from '{source_name}': zero norm")]
    DegenerateQuaternion { source_name: String },

    /// Bus subscription ended while a relay was running
    #[error("bus closed for topic '{topic}'")]
    BusClosed { topic: String },

    /// A spawned relay panicked or was cancelled
    #[error("task '{task}' failed: {message}")]
    Task { task: &'static str, message: String },
}

impl BridgeError {
    pub fn buffer_size(
        source_name: impl Into<String>,
        expected: usize,
        actual: usize,
        unit: &'static str,
    ) -> Self {
        Self::BufferSize {
            source_name: source_name.into(),
            expected,
            actual,
            unit,
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, BridgeError>;
