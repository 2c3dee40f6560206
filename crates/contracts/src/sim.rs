//! Simulator data shapes
//!
//! Mirrors the structures the simulator RPC server exchanges. Field names on
//! the wire follow the server's map encoding (`x_val`, `time_stamp`, ...).

use serde::{Deserialize, Serialize};

/// Simulator timestamp (nanoseconds)
pub type SimTimestamp = u64;

/// 3D vector as reported by the simulator (NED frame)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3r {
    #[serde(rename = "x_val")]
    pub x: f32,
    #[serde(rename = "y_val")]
    pub y: f32,
    #[serde(rename = "z_val")]
    pub z: f32,
}

impl Vector3r {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion as reported by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternionr {
    #[serde(rename = "w_val")]
    pub w: f32,
    #[serde(rename = "x_val")]
    pub x: f32,
    #[serde(rename = "y_val")]
    pub y: f32,
    #[serde(rename = "z_val")]
    pub z: f32,
}

impl Quaternionr {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }
}

impl Default for Quaternionr {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Position + orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3r,
    pub orientation: Quaternionr,
}

/// Camera capture modality
///
/// Encoded on the wire as the server's integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ImageType {
    #[default]
    Scene,
    DepthPlanner,
    DepthPerspective,
    DepthVis,
    DisparityNormalized,
    Segmentation,
    SurfaceNormals,
    Infrared,
}

impl ImageType {
    /// All modalities, in wire-code order
    pub const ALL: [ImageType; 8] = [
        ImageType::Scene,
        ImageType::DepthPlanner,
        ImageType::DepthPerspective,
        ImageType::DepthVis,
        ImageType::DisparityNormalized,
        ImageType::Segmentation,
        ImageType::SurfaceNormals,
        ImageType::Infrared,
    ];

    /// Wire code
    pub const fn code(self) -> i32 {
        match self {
            ImageType::Scene => 0,
            ImageType::DepthPlanner => 1,
            ImageType::DepthPerspective => 2,
            ImageType::DepthVis => 3,
            ImageType::DisparityNormalized => 4,
            ImageType::Segmentation => 5,
            ImageType::SurfaceNormals => 6,
            ImageType::Infrared => 7,
        }
    }

    /// Canonical modality name
    pub const fn name(self) -> &'static str {
        match self {
            ImageType::Scene => "Scene",
            ImageType::DepthPlanner => "DepthPlanner",
            ImageType::DepthPerspective => "DepthPerspective",
            ImageType::DepthVis => "DepthVis",
            ImageType::DisparityNormalized => "DisparityNormalized",
            ImageType::Segmentation => "Segmentation",
            ImageType::SurfaceNormals => "SurfaceNormals",
            ImageType::Infrared => "Infrared",
        }
    }

    /// Whether this modality is delivered as a float buffer
    pub const fn pixels_as_float(self) -> bool {
        matches!(
            self,
            ImageType::DepthPlanner
                | ImageType::DepthPerspective
                | ImageType::DepthVis
                | ImageType::DisparityNormalized
        )
    }
}

impl From<ImageType> for i32 {
    fn from(value: ImageType) -> Self {
        value.code()
    }
}

impl TryFrom<i32> for ImageType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        ImageType::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| format!("unknown image type code {code}"))
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One camera capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Camera name on the vehicle (e.g. "front_center")
    pub camera_name: String,

    /// Capture modality
    pub image_type: ImageType,

    /// Request a float buffer instead of bytes
    pub pixels_as_float: bool,

    /// Request a compressed (PNG) buffer
    pub compress: bool,
}

impl ImageRequest {
    /// Uncompressed request for the given modality
    pub fn new(camera_name: impl Into<String>, image_type: ImageType, pixels_as_float: bool) -> Self {
        Self {
            camera_name: camera_name.into(),
            image_type,
            pixels_as_float,
            compress: false,
        }
    }
}

/// One camera capture result
///
/// Responses carry no camera label; they are matched to requests by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Byte buffer (filled when `pixels_as_float` is false)
    #[serde(default)]
    pub image_data_uint8: serde_bytes::ByteBuf,

    /// Float buffer (filled when `pixels_as_float` is true)
    #[serde(default)]
    pub image_data_float: Vec<f32>,

    #[serde(default)]
    pub camera_position: Vector3r,

    #[serde(default)]
    pub camera_orientation: Quaternionr,

    #[serde(default)]
    pub time_stamp: SimTimestamp,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub pixels_as_float: bool,

    #[serde(default)]
    pub compress: bool,

    #[serde(default)]
    pub width: i32,

    #[serde(default)]
    pub height: i32,

    #[serde(default)]
    pub image_type: ImageType,
}

/// LIDAR frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LidarData {
    /// Simulator timestamp of the scan
    pub time_stamp: SimTimestamp,

    /// Flat XYZ buffer (sensor frame, NED)
    #[serde(default)]
    pub point_cloud: Vec<f32>,

    /// Per-point ground-truth labels, parallel to the points
    #[serde(default)]
    pub groundtruth: Vec<String>,

    /// Sensor pose at capture time
    #[serde(default)]
    pub pose: Pose,
}

/// IMU sample
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImuData {
    pub time_stamp: SimTimestamp,
    pub orientation: Quaternionr,
    pub angular_velocity: Vector3r,
    pub linear_acceleration: Vector3r,
}

/// Vehicle control input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarControls {
    pub throttle: f32,
    pub steering: f32,
    pub brake: f32,
    pub handbrake: bool,
    pub is_manual_gear: bool,
    pub manual_gear: i32,
    pub gear_immediate: bool,
}

impl Default for CarControls {
    fn default() -> Self {
        Self {
            throttle: 0.0,
            steering: 0.0,
            brake: 0.0,
            handbrake: false,
            is_manual_gear: false,
            manual_gear: 0,
            gear_immediate: true,
        }
    }
}
