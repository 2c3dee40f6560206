//! Simulator client abstraction
//!
//! Defines the trait the bridge talks to, supporting the real RPC client and mock testing.

use std::future::Future;

use contracts::{CarControls, ImageRequest, ImageResponse, ImuData, LidarData, Pose};

use crate::error::Result;

/// Simulator client trait
///
/// One handle is shared (behind an `Arc`) by the poll loop and the command
/// relay, so every call takes `&self`. Implementations serialize concurrent
/// calls internally if the transport requires it.
pub trait SimClient: Send + Sync {
    /// Confirm the server is reachable
    ///
    /// Must succeed before any other call.
    fn confirm_connection(&self, client_name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Hand vehicle control to the API (required before `set_car_controls`)
    fn enable_api_control(
        &self,
        enabled: bool,
        vehicle_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Capture a batch of images
    ///
    /// # Returns
    /// One response per request, in request order
    fn sim_get_images(
        &self,
        requests: &[ImageRequest],
        vehicle_name: &str,
    ) -> impl Future<Output = Result<Vec<ImageResponse>>> + Send;

    /// Latest ray-cast LIDAR frame
    fn get_lidar_data(
        &self,
        lidar_name: &str,
        vehicle_name: &str,
    ) -> impl Future<Output = Result<LidarData>> + Send;

    /// Latest GPU (high-density) LIDAR frame
    fn get_gpu_lidar_data(
        &self,
        lidar_name: &str,
        vehicle_name: &str,
    ) -> impl Future<Output = Result<LidarData>> + Send;

    /// Latest IMU sample
    fn get_imu_data(
        &self,
        imu_name: &str,
        vehicle_name: &str,
    ) -> impl Future<Output = Result<ImuData>> + Send;

    /// Current vehicle pose
    fn sim_get_vehicle_pose(&self, vehicle_name: &str) -> impl Future<Output = Result<Pose>> + Send;

    /// Apply vehicle controls
    fn set_car_controls(
        &self,
        controls: &CarControls,
        vehicle_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}
