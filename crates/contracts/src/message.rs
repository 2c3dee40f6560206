//! Bus message shapes
//!
//! Standard robotics message layouts (image, point cloud, IMU, pose,
//! transform, twist) in the bridge's output frame. Every publish builds a
//! fresh record; nothing here is mutated after it is handed to the bus.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Wall-clock stamp (seconds + nanoseconds since the Unix epoch)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i64,
    pub nanosec: u32,
}

impl Stamp {
    /// Current wall-clock time
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            sec: now.timestamp(),
            nanosec: now.timestamp_subsec_nanos(),
        }
    }

    /// Seconds as float
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// Message header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    pub frame_id: String,
    #[serde(default)]
    pub seq: u32,
}

impl Header {
    pub fn new(stamp: Stamp, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
            seq: 0,
        }
    }
}

/// Pixel encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageEncoding {
    #[serde(rename = "rgb8")]
    Rgb8,
    #[serde(rename = "mono8")]
    Mono8,
    #[serde(rename = "32FC1")]
    Float32C1,
}

impl ImageEncoding {
    /// Encoding label as used by image consumers
    pub const fn as_str(self) -> &'static str {
        match self {
            ImageEncoding::Rgb8 => "rgb8",
            ImageEncoding::Mono8 => "mono8",
            ImageEncoding::Float32C1 => "32FC1",
        }
    }

    /// Bytes per pixel
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageEncoding::Rgb8 => 3,
            ImageEncoding::Mono8 => 1,
            ImageEncoding::Float32C1 => 4,
        }
    }
}

/// Image message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMsg {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: ImageEncoding,
    pub is_bigendian: bool,
    /// Row length in bytes
    pub step: u32,
    pub data: Bytes,
}

/// Point field datatype (only 32-bit floats are produced)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointFieldType {
    Float32,
}

/// One field of a point cloud record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointField {
    pub name: String,
    pub offset: u32,
    pub datatype: PointFieldType,
    pub count: u32,
}

/// Unorganized point cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudMsg {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: u32,
    pub row_step: u32,
    pub data: Bytes,
    pub is_dense: bool,
}

impl PointCloudMsg {
    /// Bytes per XYZ point
    pub const XYZ_POINT_STEP: u32 = 12;

    /// Build an xyz32 cloud from points already in the output frame
    pub fn xyz32(header: Header, points: &[[f32; 3]]) -> Self {
        let data: Vec<u8> = if cfg!(target_endian = "little") {
            bytemuck::cast_slice(points).to_vec()
        } else {
            points.iter().flatten().flat_map(|v| v.to_le_bytes()).collect()
        };

        let fields = ["x", "y", "z"]
            .iter()
            .enumerate()
            .map(|(i, name)| PointField {
                name: (*name).to_string(),
                offset: i as u32 * 4,
                datatype: PointFieldType::Float32,
                count: 1,
            })
            .collect();

        let width = points.len() as u32;
        Self {
            header,
            height: 1,
            width,
            fields,
            is_bigendian: false,
            point_step: Self::XYZ_POINT_STEP,
            row_step: Self::XYZ_POINT_STEP * width,
            data: Bytes::from(data),
            is_dense: false,
        }
    }

    /// Number of points
    pub fn num_points(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Decode the xyz32 payload back into points
    pub fn points(&self) -> Vec<[f32; 3]> {
        self.data
            .chunks_exact(self.point_step as usize)
            .map(|chunk| {
                let read = |i: usize| {
                    f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]])
                };
                [read(0), read(4), read(8)]
            })
            .collect()
    }
}

/// Array of strings with a header (per-point labels)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringArrayMsg {
    pub header: Header,
    pub data: Vec<String>,
}

/// 3D vector (output frame)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Quaternion (output frame)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// IMU message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuMsg {
    pub header: Header,
    pub orientation: Quaternion,
    pub angular_velocity: Vector3,
    pub linear_acceleration: Vector3,
}

/// Pose (position + orientation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseMsg {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// Stamped pose message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStampedMsg {
    pub header: Header,
    pub pose: PoseMsg,
}

/// Rigid transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformMsg {
    pub translation: Vector3,
    pub rotation: Quaternion,
}

/// Stamped parent -> child transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStampedMsg {
    /// Parent frame lives in `header.frame_id`
    pub header: Header,
    pub child_frame_id: String,
    pub transform: TransformMsg,
}

/// Velocity command
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TwistMsg {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// Any message carried by the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusMessage {
    Image(ImageMsg),
    PointCloud(PointCloudMsg),
    StringArray(StringArrayMsg),
    Imu(ImuMsg),
    PoseStamped(PoseStampedMsg),
    TransformStamped(TransformStampedMsg),
    Twist(TwistMsg),
}

impl BusMessage {
    /// Short kind label (used for logging/metrics)
    pub fn kind(&self) -> &'static str {
        match self {
            BusMessage::Image(_) => "image",
            BusMessage::PointCloud(_) => "point_cloud",
            BusMessage::StringArray(_) => "string_array",
            BusMessage::Imu(_) => "imu",
            BusMessage::PoseStamped(_) => "pose_stamped",
            BusMessage::TransformStamped(_) => "transform_stamped",
            BusMessage::Twist(_) => "twist",
        }
    }

    /// Header, if the message carries one
    pub fn header(&self) -> Option<&Header> {
        match self {
            BusMessage::Image(m) => Some(&m.header),
            BusMessage::PointCloud(m) => Some(&m.header),
            BusMessage::StringArray(m) => Some(&m.header),
            BusMessage::Imu(m) => Some(&m.header),
            BusMessage::PoseStamped(m) => Some(&m.header),
            BusMessage::TransformStamped(m) => Some(&m.header),
            BusMessage::Twist(_) => None,
        }
    }
}

/// A message as routed on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Topic the message was published on
    pub topic: String,

    /// Per-topic sequence number (monotonically increasing from 1)
    pub seq: u64,

    pub message: BusMessage,
}
