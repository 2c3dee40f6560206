//! Simulator data -> bus messages
//!
//! Axis conventions: the simulator reports NED. Output positions and
//! angular rates flip Y and Z, linear acceleration flips X and Z, and
//! orientations are published inverted.

use bytes::Bytes;
use contracts::{
    CameraGeometry, CarControls, Header, ImageEncoding, ImageMsg, ImuData, ImuMsg, Pose, PoseMsg,
    PoseStampedMsg, Quaternion, Quaternionr, TransformMsg, TransformStampedMsg, TwistMsg, Vector3,
    Vector3r,
};
use image::RgbImage;

use crate::error::{BridgeError, Result};
use crate::modality::float_bytes;

/// Luma weights (ITU-R BT.601)
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Scene image, `rgb8` or `mono8`
///
/// The buffer must hold exactly `width * height * 3` bytes.
pub fn scene_image(
    header: Header,
    data: Vec<u8>,
    geometry: CameraGeometry,
    mono: bool,
    source_name: &str,
) -> Result<ImageMsg> {
    let CameraGeometry { width, height } = geometry;
    let expected = geometry.pixels() * 3;
    let actual = data.len();
    let rgb = RgbImage::from_raw(width, height, data)
        .filter(|_| actual == expected)
        .ok_or_else(|| BridgeError::buffer_size(source_name, expected, actual, "bytes"))?;

    if mono {
        let luma: Vec<u8> = rgb.pixels().map(|p| luma(p.0)).collect();
        Ok(image_msg(header, geometry, ImageEncoding::Mono8, luma))
    } else {
        Ok(image_msg(header, geometry, ImageEncoding::Rgb8, rgb.into_raw()))
    }
}

/// Segmentation image (always `rgb8`, even on a mono camera)
pub fn segmentation_image(
    header: Header,
    data: Vec<u8>,
    geometry: CameraGeometry,
    source_name: &str,
) -> Result<ImageMsg> {
    check_len(source_name, data.len(), geometry.pixels() * 3, "bytes")?;
    Ok(image_msg(header, geometry, ImageEncoding::Rgb8, data))
}

/// Depth image (`32FC1`, little-endian), one float per pixel
pub fn depth_image(
    header: Header,
    depth: &[f32],
    geometry: CameraGeometry,
    source_name: &str,
) -> Result<ImageMsg> {
    check_len(source_name, depth.len(), geometry.pixels(), "floats")?;
    Ok(image_msg(header, geometry, ImageEncoding::Float32C1, float_bytes(depth)))
}

fn check_len(source_name: &str, actual: usize, expected: usize, unit: &'static str) -> Result<()> {
    if actual != expected {
        return Err(BridgeError::buffer_size(source_name, expected, actual, unit));
    }
    Ok(())
}

fn image_msg(header: Header, geometry: CameraGeometry, encoding: ImageEncoding, data: Vec<u8>) -> ImageMsg {
    ImageMsg {
        header,
        height: geometry.height,
        width: geometry.width,
        encoding,
        is_bigendian: false,
        step: geometry.width * encoding.bytes_per_pixel(),
        data: Bytes::from(data),
    }
}

fn luma([r, g, b]: [u8; 3]) -> u8 {
    let y = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// Flat NED buffer -> output-frame XYZ triples
///
/// A trailing partial point is dropped.
pub fn lidar_points(buffer: &[f32]) -> Vec<[f32; 3]> {
    buffer
        .chunks_exact(3)
        .map(|p| [p[0], -p[1], -p[2]])
        .collect()
}

/// Conjugate over squared norm
pub fn quaternion_inverse(q: Quaternionr, source_name: &str) -> Result<Quaternion> {
    let inverse = nalgebra::Quaternion::new(q.w as f64, q.x as f64, q.y as f64, q.z as f64)
        .try_inverse()
        .ok_or_else(|| BridgeError::DegenerateQuaternion {
            source_name: source_name.to_string(),
        })?;
    Ok(Quaternion {
        x: inverse.i,
        y: inverse.j,
        z: inverse.k,
        w: inverse.w,
    })
}

fn flip_yz(v: Vector3r) -> Vector3 {
    Vector3::new(v.x as f64, -(v.y as f64), -(v.z as f64))
}

fn flip_xz(v: Vector3r) -> Vector3 {
    Vector3::new(-(v.x as f64), v.y as f64, -(v.z as f64))
}

pub fn imu_msg(header: Header, imu: &ImuData, source_name: &str) -> Result<ImuMsg> {
    Ok(ImuMsg {
        header,
        orientation: quaternion_inverse(imu.orientation, source_name)?,
        angular_velocity: flip_yz(imu.angular_velocity),
        linear_acceleration: flip_xz(imu.linear_acceleration),
    })
}

/// Vehicle pose in the output frame; `header.seq` is set to 1
pub fn pose_stamped(mut header: Header, pose: &Pose, source_name: &str) -> Result<PoseStampedMsg> {
    header.seq = 1;
    Ok(PoseStampedMsg {
        header,
        pose: PoseMsg {
            position: flip_yz(pose.position),
            orientation: quaternion_inverse(pose.orientation, source_name)?,
        },
    })
}

/// Transform `parent -> child` carrying a pose verbatim
pub fn transform_from_pose(header: Header, child_frame_id: &str, pose: &PoseMsg) -> TransformStampedMsg {
    TransformStampedMsg {
        header,
        child_frame_id: child_frame_id.to_string(),
        transform: TransformMsg {
            translation: pose.position,
            rotation: pose.orientation,
        },
    }
}

/// Velocity command -> vehicle controls
///
/// Negative forward velocity engages manual reverse gear.
pub fn twist_to_controls(twist: &TwistMsg) -> CarControls {
    let reverse = twist.linear.x < 0.0;
    CarControls {
        throttle: twist.linear.x as f32,
        steering: -twist.angular.z as f32,
        is_manual_gear: reverse,
        manual_gear: if reverse { -1 } else { 0 },
        ..CarControls::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Stamp;
    use rand::Rng;

    fn header(frame: &str) -> Header {
        Header::new(Stamp::default(), frame)
    }

    const GEOMETRY: CameraGeometry = CameraGeometry {
        width: 2,
        height: 1,
    };

    #[test]
    fn test_rgb_scene() {
        let msg = scene_image(header("cam"), vec![1, 2, 3, 4, 5, 6], GEOMETRY, false, "camera1").unwrap();
        assert_eq!(msg.encoding, ImageEncoding::Rgb8);
        assert_eq!(msg.step, 6);
        assert_eq!(&msg.data[..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_mono_uses_bt601_weights() {
        let msg = scene_image(
            header("cam"),
            vec![255, 0, 0, 10, 200, 30],
            GEOMETRY,
            true,
            "camera1",
        )
        .unwrap();
        assert_eq!(msg.encoding, ImageEncoding::Mono8);
        assert_eq!(msg.step, 2);
        // 0.299 * 255 = 76.2 ; 0.299*10 + 0.587*200 + 0.114*30 = 123.81
        assert_eq!(&msg.data[..], &[76, 124]);
    }

    #[test]
    fn test_scene_size_mismatch_is_error() {
        let err = scene_image(header("cam"), vec![0; 5], GEOMETRY, false, "camera1").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::BufferSize {
                expected: 6,
                actual: 5,
                ..
            }
        ));
        assert!(scene_image(header("cam"), vec![0; 9], GEOMETRY, true, "camera1").is_err());
    }

    #[test]
    fn test_depth_is_float_le() {
        let msg = depth_image(header("cam"), &[1.0, 2.0], GEOMETRY, "camera1").unwrap();
        assert_eq!(msg.encoding, ImageEncoding::Float32C1);
        assert_eq!(msg.step, 8);
        assert_eq!(&msg.data[4..8], &2.0f32.to_le_bytes());
    }

    #[test]
    fn test_depth_size_mismatch_is_error() {
        let err = depth_image(header("cam"), &[1.0, 2.0, 3.0], GEOMETRY, "camera2").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::BufferSize {
                expected: 2,
                actual: 3,
                unit: "floats",
                ..
            }
        ));
        assert!(depth_image(header("cam"), &[], GEOMETRY, "camera2").is_err());
    }

    #[test]
    fn test_segmentation_size_checked() {
        let msg = segmentation_image(header("cam"), vec![7; 6], GEOMETRY, "camera1").unwrap();
        assert_eq!(msg.encoding, ImageEncoding::Rgb8);
        assert_eq!(msg.step, 6);

        let err = segmentation_image(header("cam"), vec![7; 4], GEOMETRY, "camera1").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::BufferSize {
                expected: 6,
                actual: 4,
                unit: "bytes",
                ..
            }
        ));
        assert!(err.to_string().contains("camera1"));
    }

    #[test]
    fn test_lidar_flip_and_remainder() {
        let points = lidar_points(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(points, vec![[1.0, -2.0, -3.0], [4.0, -5.0, -6.0]]);
    }

    #[test]
    fn test_quaternion_inverse_matches_definition() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let q = Quaternionr::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let norm2 = (q.w * q.w + q.x * q.x + q.y * q.y + q.z * q.z) as f64;
            if norm2 < 1e-6 {
                continue;
            }
            let inv = quaternion_inverse(q, "imu").unwrap();
            assert!((inv.w - q.w as f64 / norm2).abs() < 1e-6);
            assert!((inv.x + q.x as f64 / norm2).abs() < 1e-6);
            assert!((inv.y + q.y as f64 / norm2).abs() < 1e-6);
            assert!((inv.z + q.z as f64 / norm2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_quaternion_is_error() {
        let err = quaternion_inverse(Quaternionr::new(0.0, 0.0, 0.0, 0.0), "imu").unwrap_err();
        assert!(matches!(err, BridgeError::DegenerateQuaternion { .. }));
    }

    #[test]
    fn test_imu_axes() {
        let imu = ImuData {
            time_stamp: 1,
            orientation: Quaternionr::IDENTITY,
            angular_velocity: Vector3r::new(1.0, 2.0, 3.0),
            linear_acceleration: Vector3r::new(4.0, 5.0, 6.0),
        };
        let msg = imu_msg(header("base_link"), &imu, "imu").unwrap();
        assert_eq!(msg.angular_velocity, Vector3::new(1.0, -2.0, -3.0));
        assert_eq!(msg.linear_acceleration, Vector3::new(-4.0, 5.0, -6.0));
        assert_eq!(msg.orientation, Quaternion::default());
    }

    #[test]
    fn test_pose_axes_and_seq() {
        let pose = Pose {
            position: Vector3r::new(1.0, 2.0, 3.0),
            orientation: Quaternionr::new(0.0, 0.0, 0.0, 1.0),
        };
        let msg = pose_stamped(header("world"), &pose, "pose").unwrap();
        assert_eq!(msg.header.seq, 1);
        assert_eq!(msg.pose.position, Vector3::new(1.0, -2.0, -3.0));
        assert_eq!(msg.pose.orientation.z, -1.0);

        let tf = transform_from_pose(msg.header.clone(), "base_link", &msg.pose);
        assert_eq!(tf.header.frame_id, "world");
        assert_eq!(tf.child_frame_id, "base_link");
        assert_eq!(tf.transform.translation, msg.pose.position);
    }

    #[test]
    fn test_reverse_engages_manual_gear() {
        let mut twist = TwistMsg::default();
        twist.linear.x = -0.5;
        twist.angular.z = 0.25;
        let controls = twist_to_controls(&twist);
        assert!(controls.is_manual_gear);
        assert_eq!(controls.manual_gear, -1);
        assert_eq!(controls.throttle, -0.5);
        assert_eq!(controls.steering, -0.25);
    }

    #[test]
    fn test_forward_clears_manual_gear() {
        let mut twist = TwistMsg::default();
        twist.linear.x = 0.0;
        let controls = twist_to_controls(&twist);
        assert!(!controls.is_manual_gear);
        assert_eq!(controls.throttle, 0.0);

        twist.linear.x = 0.8;
        assert!(!twist_to_controls(&twist).is_manual_gear);
    }
}
