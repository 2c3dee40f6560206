//! Live simulator client
//!
//! Talks msgpack-rpc over TCP to the simulator's RPC server.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use contracts::{CarControls, ImageRequest, ImageResponse, ImuData, LidarData, Pose};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::client::SimClient;
use crate::error::{Result, SimError};
use crate::rpc::{RpcConnection, NO_PARAMS};

/// Live simulator client
///
/// Calls are serialized through one connection. A connection that fails at
/// the transport level is dropped and reopened on the next call.
pub struct AirSimClient {
    addr: String,
    conn: Mutex<Option<RpcConnection>>,
    next_id: AtomicU32,
    confirmed: AtomicBool,
}

impl AirSimClient {
    /// Open a TCP connection to `host:port`
    ///
    /// The server is not contacted until `confirm_connection`.
    #[instrument(name = "airsim_connect", fields(host = %host, port))]
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let conn = RpcConnection::open(&addr)
            .await
            .map_err(|e| SimError::ConnectionFailed {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        info!(addr = %addr, "tcp connection to simulator opened");
        Ok(Self {
            addr,
            conn: Mutex::new(Some(conn)),
            next_id: AtomicU32::new(0),
            confirmed: AtomicBool::new(false),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            debug!(addr = %self.addr, "reopening simulator connection");
            *guard = Some(RpcConnection::open(&self.addr).await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(SimError::NotConnected);
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let result = conn.call(id, method, params).await;
        if let Err(e) = &result {
            if e.is_fatal_for_connection() {
                warn!(method, error = %e, "dropping simulator connection");
                *guard = None;
            }
        }
        result
    }

    /// Like `call`, but refuses to run before the connection is confirmed
    async fn confirmed_call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        if !self.confirmed.load(Ordering::Acquire) {
            return Err(SimError::NotConnected);
        }
        self.call(method, params).await
    }
}

impl SimClient for AirSimClient {
    #[instrument(name = "airsim_confirm_connection", skip(self), fields(addr = %self.addr))]
    async fn confirm_connection(&self, client_name: &str) -> Result<()> {
        let alive: bool = self
            .call("ping", &NO_PARAMS)
            .await
            .map_err(|e| SimError::ConnectionFailed {
                addr: self.addr.clone(),
                message: e.to_string(),
            })?;
        if !alive {
            return Err(SimError::ConnectionFailed {
                addr: self.addr.clone(),
                message: "ping returned false".into(),
            });
        }
        self.confirmed.store(true, Ordering::Release);
        info!(client_name, "connected to simulator");
        Ok(())
    }

    #[instrument(name = "airsim_enable_api_control", skip(self), fields(enabled, vehicle = %vehicle_name))]
    async fn enable_api_control(&self, enabled: bool, vehicle_name: &str) -> Result<()> {
        self.confirmed_call("enableApiControl", &(enabled, vehicle_name))
            .await
    }

    #[instrument(name = "airsim_get_images", skip(self, requests), fields(count = requests.len(), vehicle = %vehicle_name))]
    async fn sim_get_images(
        &self,
        requests: &[ImageRequest],
        vehicle_name: &str,
    ) -> Result<Vec<ImageResponse>> {
        self.confirmed_call("simGetImages", &(requests, vehicle_name))
            .await
    }

    #[instrument(name = "airsim_get_lidar", skip(self), fields(lidar = %lidar_name, vehicle = %vehicle_name))]
    async fn get_lidar_data(&self, lidar_name: &str, vehicle_name: &str) -> Result<LidarData> {
        self.confirmed_call("getLidarData", &(lidar_name, vehicle_name))
            .await
    }

    #[instrument(name = "airsim_get_gpu_lidar", skip(self), fields(lidar = %lidar_name, vehicle = %vehicle_name))]
    async fn get_gpu_lidar_data(&self, lidar_name: &str, vehicle_name: &str) -> Result<LidarData> {
        self.confirmed_call("getGPULidarData", &(lidar_name, vehicle_name))
            .await
    }

    #[instrument(name = "airsim_get_imu", skip(self), fields(imu = %imu_name, vehicle = %vehicle_name))]
    async fn get_imu_data(&self, imu_name: &str, vehicle_name: &str) -> Result<ImuData> {
        self.confirmed_call("getImuData", &(imu_name, vehicle_name))
            .await
    }

    #[instrument(name = "airsim_get_pose", skip(self), fields(vehicle = %vehicle_name))]
    async fn sim_get_vehicle_pose(&self, vehicle_name: &str) -> Result<Pose> {
        self.confirmed_call("simGetVehiclePose", &(vehicle_name,))
            .await
    }

    #[instrument(name = "airsim_set_car_controls", skip(self, controls), fields(throttle = controls.throttle, steering = controls.steering))]
    async fn set_car_controls(&self, controls: &CarControls, vehicle_name: &str) -> Result<()> {
        self.confirmed_call("setCarControls", &(controls, vehicle_name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Quaternionr, Vector3r};
    use rmpv::Value;
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Minimal msgpack-rpc server side of one connection
    struct FakeServer {
        stream: TcpStream,
        buffer: Vec<u8>,
    }

    impl FakeServer {
        /// Next request as `(msgid, method, params)`
        async fn request(&mut self) -> (u64, String, Value) {
            loop {
                let mut cursor = Cursor::new(self.buffer.as_slice());
                if let Ok(value) = rmpv::decode::read_value(&mut cursor) {
                    let consumed = cursor.position() as usize;
                    self.buffer.drain(..consumed);
                    let items = value.as_array().unwrap().clone();
                    assert_eq!(items[0].as_u64(), Some(0), "not a request frame");
                    return (
                        items[1].as_u64().unwrap(),
                        items[2].as_str().unwrap().to_string(),
                        items[3].clone(),
                    );
                }
                let mut chunk = [0u8; 4096];
                let n = self.stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client hung up");
                self.buffer.extend_from_slice(&chunk[..n]);
            }
        }

        async fn reply<T: Serialize>(&mut self, id: u64, result: &T) {
            let frame = rmp_serde::to_vec_named(&(1u8, id, (), result)).unwrap();
            self.stream.write_all(&frame).await.unwrap();
        }

        async fn reply_error(&mut self, id: u64, message: &str) {
            let frame = rmp_serde::to_vec_named(&(1u8, id, message, ())).unwrap();
            self.stream.write_all(&frame).await.unwrap();
        }
    }

    async fn serve<F, Fut>(script: F) -> (AirSimClient, JoinHandle<()>)
    where
        F: FnOnce(FakeServer) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            script(FakeServer {
                stream,
                buffer: Vec::new(),
            })
            .await;
        });
        let client = AirSimClient::connect("127.0.0.1", port).await.unwrap();
        (client, server)
    }

    fn imu_sample() -> ImuData {
        ImuData {
            time_stamp: 42,
            orientation: Quaternionr::new(1.0, 0.0, 0.0, 0.0),
            angular_velocity: Vector3r::new(0.1, 0.2, 0.3),
            linear_acceleration: Vector3r::new(0.0, 0.0, -9.8),
        }
    }

    #[tokio::test]
    async fn test_confirm_connection_pings_with_empty_params() {
        let (client, server) = serve(|mut server| async move {
            let (id, method, params) = server.request().await;
            assert_eq!(method, "ping");
            assert_eq!(params, Value::Array(Vec::new()));
            server.reply(id, &true).await;
        })
        .await;

        client.confirm_connection("test").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_calls_refused_before_confirmation() {
        let (client, _server) = serve(|_server| async move {}).await;
        let err = client.get_imu_data("imu", "car").await.unwrap_err();
        assert!(matches!(err, SimError::NotConnected));
    }

    #[tokio::test]
    async fn test_imu_result_is_decoded() {
        let (client, server) = serve(|mut server| async move {
            let (id, _, _) = server.request().await;
            server.reply(id, &true).await;

            let (id, method, params) = server.request().await;
            assert_eq!(method, "getImuData");
            let params = params.as_array().unwrap().clone();
            assert_eq!(params[0].as_str(), Some("imu"));
            assert_eq!(params[1].as_str(), Some("car"));
            server.reply(id, &imu_sample()).await;
        })
        .await;

        client.confirm_connection("test").await.unwrap();
        let imu = client.get_imu_data("imu", "car").await.unwrap();
        assert_eq!(imu.time_stamp, 42);
        assert_eq!(imu.linear_acceleration, Vector3r::new(0.0, 0.0, -9.8));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_reply_is_rpc_error_and_keeps_connection() {
        let (client, server) = serve(|mut server| async move {
            let (id, _, _) = server.request().await;
            server.reply(id, &true).await;

            let (id, _, _) = server.request().await;
            server.reply_error(id, "vehicle not found").await;

            // Same socket serves the next call
            let (id, method, _) = server.request().await;
            assert_eq!(method, "simGetVehiclePose");
            server.reply(id, &contracts::Pose::default()).await;
        })
        .await;

        client.confirm_connection("test").await.unwrap();
        let err = client.get_imu_data("imu", "ghost").await.unwrap_err();
        assert!(matches!(err, SimError::Rpc { .. }), "got {err:?}");
        assert!(err.to_string().contains("vehicle not found"));

        client.sim_get_vehicle_pose("car").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_split_across_writes() {
        let (client, server) = serve(|mut server| async move {
            let (id, _, _) = server.request().await;
            server.reply(id, &true).await;

            let (id, _, _) = server.request().await;
            let frame = rmp_serde::to_vec_named(&(1u8, id, (), imu_sample())).unwrap();
            let (head, tail) = frame.split_at(frame.len() / 2);
            server.stream.write_all(head).await.unwrap();
            server.stream.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            server.stream.write_all(tail).await.unwrap();
        })
        .await;

        client.confirm_connection("test").await.unwrap();
        let imu = client.get_imu_data("imu", "car").await.unwrap();
        assert_eq!(imu.time_stamp, 42);
        server.await.unwrap();
    }
}
