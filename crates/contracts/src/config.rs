//! BridgeConfig - Config Loader output
//!
//! Describes the whole bridge: simulator endpoint, rates, per-sensor enable
//! flags, topic names, frame labels, camera geometry and output sinks.
//! Every field has a default, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BridgeConfig {
    /// Configuration version
    pub version: ConfigVersion,

    /// Simulator endpoint and vehicle
    #[validate(nested)]
    pub simulator: SimulatorConfig,

    /// Loop and image rates
    #[validate(nested)]
    pub rates: RateConfig,

    /// The three camera slots
    pub cameras: CamerasConfig,

    /// Shared camera resolution
    #[validate(nested)]
    pub camera_geometry: CameraGeometry,

    pub lidar: LidarConfig,

    pub imu: ImuConfig,

    pub pose: PoseConfig,

    pub car_control: CarControlConfig,

    /// In-process bus settings
    #[validate(nested)]
    pub bus: BusConfig,

    /// Output routes
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// Simulator endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulatorConfig {
    /// RPC server host
    #[validate(length(min = 1))]
    pub host: String,

    /// RPC server port
    pub port: u16,

    /// Vehicle the sensors are attached to
    pub vehicle_name: String,

    /// Name reported when confirming the connection
    pub client_name: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 41451,
            vehicle_name: "airsimvehicle".to_string(),
            client_name: "airsim_bridge".to_string(),
        }
    }
}

/// Loop rates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RateConfig {
    /// Image (and LIDAR) rate in Hz
    #[validate(range(min = 1))]
    pub rate: u32,

    /// Main loop rate in Hz (IMU and pose are sampled every tick)
    #[validate(range(min = 1))]
    pub imu_rate: u32,
}

impl RateConfig {
    /// Number of main-loop ticks per image sub-tick (at least 1)
    pub fn image_divisor(&self) -> u32 {
        (self.imu_rate / self.rate.max(1)).max(1)
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            rate: 10,
            imu_rate: 100,
        }
    }
}

/// Camera slot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSlot {
    Camera1,
    Camera2,
    Camera3,
}

impl CameraSlot {
    /// Slots in request-build order
    pub const ALL: [CameraSlot; 3] = [CameraSlot::Camera1, CameraSlot::Camera2, CameraSlot::Camera3];

    pub const fn index(self) -> usize {
        match self {
            CameraSlot::Camera1 => 0,
            CameraSlot::Camera2 => 1,
            CameraSlot::Camera3 => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            CameraSlot::Camera1 => "camera1",
            CameraSlot::Camera2 => "camera2",
            CameraSlot::Camera3 => "camera3",
        }
    }

    fn default_camera_name(self) -> &'static str {
        match self {
            CameraSlot::Camera1 => "front_center",
            CameraSlot::Camera2 => "front_left",
            CameraSlot::Camera3 => "front_right",
        }
    }

    /// Topic suffix used by the default topic names ("", "2", "3")
    fn topic_suffix(self) -> &'static str {
        match self {
            CameraSlot::Camera1 => "",
            CameraSlot::Camera2 => "2",
            CameraSlot::Camera3 => "3",
        }
    }
}

impl std::fmt::Display for CameraSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The three camera slots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CamerasConfig {
    pub camera1: CameraConfig,
    pub camera2: CameraConfig,
    pub camera3: CameraConfig,
}

impl CamerasConfig {
    pub fn get(&self, slot: CameraSlot) -> &CameraConfig {
        match slot {
            CameraSlot::Camera1 => &self.camera1,
            CameraSlot::Camera2 => &self.camera2,
            CameraSlot::Camera3 => &self.camera3,
        }
    }

    /// Resolve all slots, filling per-slot defaults
    pub fn resolve(&self) -> [CameraSettings; 3] {
        CameraSlot::ALL.map(|slot| self.get(slot).resolve(slot))
    }
}

/// Per-camera options as written in the configuration
///
/// Names and topics left unset take the slot's default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Publish this camera
    pub active: bool,

    /// Only capture the Scene modality
    pub scene_only: bool,

    /// Publish the Scene image as grayscale
    pub mono: bool,

    /// Camera name on the vehicle
    pub name: Option<String>,

    /// Output frame label
    pub frame_id: Option<String>,

    pub scene_topic: Option<String>,

    pub segmentation_topic: Option<String>,

    pub depth_topic: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            active: true,
            scene_only: false,
            mono: false,
            name: None,
            frame_id: None,
            scene_topic: None,
            segmentation_topic: None,
            depth_topic: None,
        }
    }
}

impl CameraConfig {
    /// Fill unset names with the slot's defaults
    pub fn resolve(&self, slot: CameraSlot) -> CameraSettings {
        let suffix = slot.topic_suffix();
        CameraSettings {
            slot,
            active: self.active,
            scene_only: self.scene_only,
            mono: self.mono,
            name: self
                .name
                .clone()
                .unwrap_or_else(|| slot.default_camera_name().to_string()),
            frame_id: self
                .frame_id
                .clone()
                .unwrap_or_else(|| "base_camera".to_string()),
            scene_topic: self
                .scene_topic
                .clone()
                .unwrap_or_else(|| format!("airsim/rgb{suffix}/image")),
            segmentation_topic: self
                .segmentation_topic
                .clone()
                .unwrap_or_else(|| format!("airsim/segmentation{suffix}/image")),
            depth_topic: self
                .depth_topic
                .clone()
                .unwrap_or_else(|| format!("airsim/depth{suffix}/image")),
        }
    }
}

/// Fully resolved camera settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraSettings {
    pub slot: CameraSlot,
    pub active: bool,
    pub scene_only: bool,
    pub mono: bool,
    pub name: String,
    pub frame_id: String,
    pub scene_topic: String,
    pub segmentation_topic: String,
    pub depth_topic: String,
}

/// Shared camera resolution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CameraGeometry {
    #[validate(range(min = 1))]
    pub width: u32,

    #[validate(range(min = 1))]
    pub height: u32,
}

impl CameraGeometry {
    pub const fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for CameraGeometry {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
        }
    }
}

/// LIDAR options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarConfig {
    /// Poll the ray-cast LIDAR
    pub active: bool,

    /// Poll the GPU (high-density) LIDAR; takes precedence over `active`
    pub gpu_active: bool,

    /// Sensor name on the vehicle
    pub name: String,

    pub frame_id: String,

    /// Point cloud topic
    pub topic: String,

    /// Per-point label topic
    pub groundtruth_topic: String,
}

impl LidarConfig {
    /// Whether any LIDAR variant is polled
    pub fn enabled(&self) -> bool {
        self.active || self.gpu_active
    }
}

impl Default for LidarConfig {
    fn default() -> Self {
        Self {
            active: true,
            gpu_active: false,
            name: "lidar".to_string(),
            frame_id: "base_laser".to_string(),
            topic: "airsim/lidar".to_string(),
            groundtruth_topic: "airsim/lidargroundtruth".to_string(),
        }
    }
}

/// IMU options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    pub active: bool,
    pub name: String,
    pub frame_id: String,
    pub topic: String,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            active: true,
            name: "imu".to_string(),
            frame_id: "base_link".to_string(),
            topic: "airsim/imu".to_string(),
        }
    }
}

/// Vehicle pose options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub active: bool,

    /// Parent frame of the published pose and transform
    pub frame_id: String,

    /// Output pose topic
    pub topic: String,

    /// Input topic whose poses are rebroadcast as transforms
    pub override_topic: String,

    /// Transform broadcast topic
    pub transform_topic: String,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            active: true,
            frame_id: "world".to_string(),
            topic: "airsim/pose".to_string(),
            override_topic: "airsim/pose_override".to_string(),
            transform_topic: "tf".to_string(),
        }
    }
}

/// Velocity command relay options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarControlConfig {
    pub active: bool,
    pub input_topic: String,
}

impl Default for CarControlConfig {
    fn default() -> Self {
        Self {
            active: false,
            input_topic: "cmd_vel".to_string(),
        }
    }
}

/// In-process bus settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BusConfig {
    /// Per-topic queue depth (oldest dropped for lagging subscribers)
    #[validate(range(min = 1))]
    pub queue_depth: usize,

    /// Capacity of the tap that feeds the sinks
    #[validate(range(min = 1))]
    pub tap_capacity: usize,

    /// UDP address for inbound JSON messages (None = disabled)
    pub ingress_addr: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_depth: 1,
            tap_capacity: 256,
            ingress_addr: None,
        }
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// tracing output
    Log,
    /// Files on disk
    File,
    /// UDP datagrams
    Network,
}
