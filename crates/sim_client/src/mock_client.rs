//! Mock simulator client
//!
//! Scriptable stand-in for the live simulator, used by unit tests, the e2e
//! suite and `--mock` runs. Supports failure injection per method.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{
    CarControls, ImageRequest, ImageResponse, ImuData, LidarData, Pose, Quaternionr, Vector3r,
};
use tracing::instrument;

use crate::client::SimClient;
use crate::error::{Result, SimError};

/// Mock client configuration
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Methods (wire names, e.g. "getImuData") that should fail
    pub fail_methods: Vec<String>,
    /// Refuse `confirm_connection`
    pub fail_connect: bool,
    /// Geometry of synthesized images
    pub image_width: u32,
    pub image_height: u32,
    /// Points in a synthesized LIDAR frame
    pub lidar_points: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fail_methods: Vec::new(),
            fail_connect: false,
            image_width: 4,
            image_height: 3,
            lidar_points: 8,
        }
    }
}

/// Mock simulator client
pub struct MockSimClient {
    config: MockConfig,
    connected: Mutex<bool>,
    /// Simulated clock, advances on every sensor read
    clock: AtomicU64,
    /// Scripted image batches, served in order before synthesizing
    image_batches: Mutex<VecDeque<Vec<ImageResponse>>>,
    /// Scripted LIDAR frames, served in order; the last one repeats.
    /// With nothing scripted every read synthesizes a fresh scan.
    lidar_frames: Mutex<VecDeque<LidarData>>,
    last_lidar: Mutex<Option<LidarData>>,
    imu: Mutex<ImuData>,
    pose: Mutex<Pose>,
    api_control: Mutex<Option<bool>>,
    image_requests: Mutex<Vec<Vec<ImageRequest>>>,
    controls_history: Mutex<Vec<CarControls>>,
    calls: Mutex<HashMap<&'static str, u64>>,
}

impl MockSimClient {
    /// Create default mock client
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create mock client with configuration
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            connected: Mutex::new(false),
            clock: AtomicU64::new(1_000_000),
            image_batches: Mutex::new(VecDeque::new()),
            lidar_frames: Mutex::new(VecDeque::new()),
            last_lidar: Mutex::new(None),
            imu: Mutex::new(ImuData::default()),
            pose: Mutex::new(Pose::default()),
            api_control: Mutex::new(None),
            image_requests: Mutex::new(Vec::new()),
            controls_history: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Queue one `simGetImages` result
    pub fn push_image_batch(&self, batch: Vec<ImageResponse>) {
        self.image_batches.lock().unwrap().push_back(batch);
    }

    /// Queue one LIDAR frame (shared by both LIDAR variants)
    pub fn push_lidar_frame(&self, frame: LidarData) {
        self.lidar_frames.lock().unwrap().push_back(frame);
    }

    pub fn set_imu(&self, imu: ImuData) {
        *self.imu.lock().unwrap() = imu;
    }

    pub fn set_pose(&self, pose: Pose) {
        *self.pose.lock().unwrap() = pose;
    }

    /// Every request batch passed to `sim_get_images`
    pub fn image_requests(&self) -> Vec<Vec<ImageRequest>> {
        self.image_requests.lock().unwrap().clone()
    }

    /// Every control set applied, in order
    pub fn controls_history(&self) -> Vec<CarControls> {
        self.controls_history.lock().unwrap().clone()
    }

    /// Last `enable_api_control` value, if any
    pub fn api_control_enabled(&self) -> Option<bool> {
        *self.api_control.lock().unwrap()
    }

    /// Number of calls made to a method (wire name)
    pub fn call_count(&self, method: &str) -> u64 {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// Synthesize a frame in the simulator's layout (flat XYZ, NED)
    pub fn synthetic_lidar(time_stamp: u64, points: usize) -> LidarData {
        let point_cloud = (0..points)
            .flat_map(|i| {
                let f = i as f32;
                [f, f * 0.5, -1.0 - f * 0.1]
            })
            .collect();
        let groundtruth = (0..points).map(|i| format!("object_{}", i % 3)).collect();
        LidarData {
            time_stamp,
            point_cloud,
            groundtruth,
            pose: Pose::default(),
        }
    }

    fn tick_clock(&self) -> u64 {
        self.clock.fetch_add(10_000_000, Ordering::SeqCst)
    }

    fn begin_call(&self, method: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        self.ensure_connected()?;
        if self.config.fail_methods.iter().any(|m| m == method) {
            return Err(SimError::Injected {
                method: method.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if *self.connected.lock().unwrap() {
            Ok(())
        } else {
            Err(SimError::NotConnected)
        }
    }

    fn synthetic_image(&self, request: &ImageRequest, time_stamp: u64) -> ImageResponse {
        let width = self.config.image_width;
        let height = self.config.image_height;
        let pixels = (width * height) as usize;

        let mut response = ImageResponse {
            camera_orientation: Quaternionr::IDENTITY,
            time_stamp,
            pixels_as_float: request.pixels_as_float,
            width: width as i32,
            height: height as i32,
            image_type: request.image_type,
            ..Default::default()
        };
        if request.pixels_as_float {
            response.image_data_float = (0..pixels).map(|i| 1.0 + i as f32 * 0.25).collect();
        } else {
            let seed = request.image_type.code() as u8;
            response.image_data_uint8 = serde_bytes::ByteBuf::from(
                (0..pixels * 3)
                    .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
                    .collect::<Vec<u8>>(),
            );
        }
        response
    }

    fn next_lidar(&self) -> LidarData {
        let mut last = self.last_lidar.lock().unwrap();
        if let Some(frame) = self.lidar_frames.lock().unwrap().pop_front() {
            *last = Some(frame);
        }
        match last.as_ref() {
            Some(frame) => frame.clone(),
            // Unscripted: a new scan per read, like a spinning sensor
            None => Self::synthetic_lidar(self.tick_clock(), self.config.lidar_points),
        }
    }
}

impl Default for MockSimClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClient for MockSimClient {
    #[instrument(name = "mock_sim_confirm_connection", skip(self))]
    async fn confirm_connection(&self, client_name: &str) -> Result<()> {
        if self.config.fail_connect {
            return Err(SimError::ConnectionFailed {
                addr: "mock".into(),
                message: "connection refused".into(),
            });
        }
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    #[instrument(name = "mock_sim_enable_api_control", skip(self))]
    async fn enable_api_control(&self, enabled: bool, vehicle_name: &str) -> Result<()> {
        self.begin_call("enableApiControl")?;
        *self.api_control.lock().unwrap() = Some(enabled);
        Ok(())
    }

    #[instrument(name = "mock_sim_get_images", skip(self, requests), fields(count = requests.len()))]
    async fn sim_get_images(
        &self,
        requests: &[ImageRequest],
        vehicle_name: &str,
    ) -> Result<Vec<ImageResponse>> {
        self.begin_call("simGetImages")?;
        self.image_requests.lock().unwrap().push(requests.to_vec());

        if let Some(batch) = self.image_batches.lock().unwrap().pop_front() {
            return Ok(batch);
        }
        let time_stamp = self.tick_clock();
        Ok(requests
            .iter()
            .map(|r| self.synthetic_image(r, time_stamp))
            .collect())
    }

    #[instrument(name = "mock_sim_get_lidar", skip(self))]
    async fn get_lidar_data(&self, lidar_name: &str, vehicle_name: &str) -> Result<LidarData> {
        self.begin_call("getLidarData")?;
        Ok(self.next_lidar())
    }

    #[instrument(name = "mock_sim_get_gpu_lidar", skip(self))]
    async fn get_gpu_lidar_data(&self, lidar_name: &str, vehicle_name: &str) -> Result<LidarData> {
        self.begin_call("getGPULidarData")?;
        Ok(self.next_lidar())
    }

    #[instrument(name = "mock_sim_get_imu", skip(self))]
    async fn get_imu_data(&self, imu_name: &str, vehicle_name: &str) -> Result<ImuData> {
        self.begin_call("getImuData")?;
        let mut imu = *self.imu.lock().unwrap();
        imu.time_stamp = self.tick_clock();
        Ok(imu)
    }

    #[instrument(name = "mock_sim_get_pose", skip(self))]
    async fn sim_get_vehicle_pose(&self, vehicle_name: &str) -> Result<Pose> {
        self.begin_call("simGetVehiclePose")?;
        Ok(*self.pose.lock().unwrap())
    }

    #[instrument(name = "mock_sim_set_car_controls", skip(self, controls))]
    async fn set_car_controls(&self, controls: &CarControls, vehicle_name: &str) -> Result<()> {
        self.begin_call("setCarControls")?;
        self.controls_history.lock().unwrap().push(*controls);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ImageType;

    async fn connected() -> MockSimClient {
        let client = MockSimClient::new();
        client.confirm_connection("test").await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_calls_require_connection() {
        let client = MockSimClient::new();
        let err = client.get_imu_data("", "car").await.unwrap_err();
        assert!(matches!(err, SimError::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let client = MockSimClient::with_config(MockConfig {
            fail_connect: true,
            ..Default::default()
        });
        assert!(client.confirm_connection("test").await.is_err());
    }

    #[tokio::test]
    async fn test_synthetic_images_follow_requests() {
        let client = connected().await;
        let requests = vec![
            ImageRequest::new("front_center", ImageType::Scene, false),
            ImageRequest::new("front_center", ImageType::DepthPlanner, true),
        ];
        let responses = client.sim_get_images(&requests, "car").await.unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].image_data_uint8.len(), 4 * 3 * 3);
        assert_eq!(responses[1].image_data_float.len(), 4 * 3);
        assert_eq!(client.image_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_batch_served_first() {
        let client = connected().await;
        client.push_image_batch(vec![ImageResponse::default()]);

        let requests = vec![ImageRequest::new("cam", ImageType::Scene, false)];
        let first = client.sim_get_images(&requests, "car").await.unwrap();
        assert!(first[0].image_data_uint8.is_empty());

        let second = client.sim_get_images(&requests, "car").await.unwrap();
        assert!(!second[0].image_data_uint8.is_empty());
    }

    #[tokio::test]
    async fn test_lidar_repeats_last_frame() {
        let client = connected().await;
        client.push_lidar_frame(MockSimClient::synthetic_lidar(5, 2));

        let a = client.get_lidar_data("", "car").await.unwrap();
        let b = client.get_gpu_lidar_data("", "car").await.unwrap();
        assert_eq!(a.time_stamp, 5);
        assert_eq!(b.time_stamp, 5);
        assert_eq!(client.call_count("getLidarData"), 1);
        assert_eq!(client.call_count("getGPULidarData"), 1);
    }

    #[tokio::test]
    async fn test_unscripted_lidar_advances() {
        let client = connected().await;
        let a = client.get_lidar_data("", "car").await.unwrap();
        let b = client.get_lidar_data("", "car").await.unwrap();
        let c = client.get_gpu_lidar_data("", "car").await.unwrap();

        assert!(b.time_stamp > a.time_stamp);
        assert!(c.time_stamp > b.time_stamp);
        assert_eq!(a.point_cloud.len(), 8 * 3);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let client = MockSimClient::with_config(MockConfig {
            fail_methods: vec!["getImuData".into()],
            ..Default::default()
        });
        client.confirm_connection("test").await.unwrap();

        let err = client.get_imu_data("", "car").await.unwrap_err();
        assert!(matches!(err, SimError::Injected { .. }));
        assert!(client.sim_get_vehicle_pose("car").await.is_ok());
    }

    #[tokio::test]
    async fn test_controls_recorded() {
        let client = connected().await;
        client.enable_api_control(true, "car").await.unwrap();
        let controls = CarControls {
            throttle: 0.5,
            ..Default::default()
        };
        client.set_car_controls(&controls, "car").await.unwrap();

        assert_eq!(client.api_control_enabled(), Some(true));
        assert_eq!(client.controls_history(), vec![controls]);
    }

    #[tokio::test]
    async fn test_imu_timestamp_advances() {
        let client = connected().await;
        client.set_imu(ImuData {
            angular_velocity: Vector3r::new(1.0, 2.0, 3.0),
            ..Default::default()
        });
        let a = client.get_imu_data("", "car").await.unwrap();
        let b = client.get_imu_data("", "car").await.unwrap();
        assert!(b.time_stamp > a.time_stamp);
        assert_eq!(a.angular_velocity, Vector3r::new(1.0, 2.0, 3.0));
    }
}
