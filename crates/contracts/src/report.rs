//! TickReport - Poll loop output
//!
//! Per-tick summary handed to metrics.

use serde::{Deserialize, Serialize};

/// What happened to the LIDAR frame fetched on a sub-tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LidarOutcome {
    /// New frame, point cloud and labels published
    Published { points: usize },

    /// Same timestamp as the last frame, skipped
    Duplicate,

    /// New timestamp but no points, guard updated, nothing published
    Empty,
}

impl LidarOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            LidarOutcome::Published { .. } => "published",
            LidarOutcome::Duplicate => "duplicate",
            LidarOutcome::Empty => "empty",
        }
    }
}

/// Summary of one main-loop tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number (from 1)
    pub tick: u64,

    /// Whether the image sub-tick ran on this tick
    pub image_subtick: bool,

    /// Image messages published
    pub images_published: u32,

    /// LIDAR outcome (None when LIDAR is disabled or no sub-tick ran)
    pub lidar: Option<LidarOutcome>,

    pub imu_published: bool,

    pub pose_published: bool,

    /// Wall time spent in the tick body (milliseconds)
    pub duration_ms: f64,
}
