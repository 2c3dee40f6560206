//! Sensor poll-and-publish loop
//!
//! Runs at `imu_rate`. Every `imu_rate / rate` ticks an image sub-tick
//! captures the camera batch and the LIDAR frame; IMU and pose are published
//! on every tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    BridgeConfig, BusMessage, CameraGeometry, CameraSettings, Header, ImageRequest, ImageType,
    LidarOutcome, PointCloudMsg, SimTimestamp, Stamp, StringArrayMsg, TickReport,
};
use dispatcher::{MessageBus, Publisher};
use observability::{record_message_published, record_tick_metrics, BridgeMetricsAggregator};
use serde::Serialize;
use sim_client::SimClient;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::call::timed;
use crate::convert;
use crate::error::{BridgeError, Result};
use crate::layout::{build_requests, CameraSlots, ResponseLayout};
use crate::modality::image_bytes;
use crate::shutdown::ShutdownSignal;

/// Which LIDAR call the loop makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LidarVariant {
    RayCast,
    Gpu,
}

struct CameraOutput {
    settings: CameraSettings,
    slots: CameraSlots,
    scene: Publisher,
    segmentation: Option<Publisher>,
    depth: Option<Publisher>,
}

struct LidarOutput {
    variant: LidarVariant,
    name: String,
    frame_id: String,
    cloud: Publisher,
    labels: Publisher,
    /// Timestamp of the last frame fetched (published or not)
    last_seen: Option<SimTimestamp>,
}

struct ImuOutput {
    name: String,
    frame_id: String,
    publisher: Publisher,
}

struct PoseOutput {
    frame_id: String,
    child_frame_id: String,
    publisher: Publisher,
    transform: Publisher,
}

/// The main loop
pub struct PollLoop<C> {
    client: Arc<C>,
    vehicle: String,
    geometry: CameraGeometry,
    period: Duration,
    divisor: u32,
    requests: Vec<ImageRequest>,
    layout: ResponseLayout,
    cameras: Vec<CameraOutput>,
    lidar: Option<LidarOutput>,
    imu: Option<ImuOutput>,
    pose: Option<PoseOutput>,
    counter: u32,
    ticks: u64,
    stats: BridgeMetricsAggregator,
}

impl<C: SimClient> PollLoop<C> {
    /// Build the request batch and slot table, advertise every output topic
    ///
    /// The client must already be confirmed.
    pub fn new(config: &BridgeConfig, client: Arc<C>, bus: &MessageBus) -> Self {
        let settings = config.cameras.resolve();
        let requests = build_requests(&settings);
        let layout = ResponseLayout::from_settings(&settings);

        let cameras = settings
            .into_iter()
            .filter_map(|settings| {
                let slots = layout.camera(settings.slot)?;
                Some(CameraOutput {
                    scene: bus.advertise(&settings.scene_topic),
                    segmentation: slots
                        .segmentation
                        .map(|_| bus.advertise(&settings.segmentation_topic)),
                    depth: slots.depth.map(|_| bus.advertise(&settings.depth_topic)),
                    settings,
                    slots,
                })
            })
            .collect();

        let lidar = config.lidar.enabled().then(|| {
            let variant = if config.lidar.gpu_active {
                warn!("GPU LIDAR enabled; the simulator must be built with GPU LIDAR support");
                LidarVariant::Gpu
            } else {
                LidarVariant::RayCast
            };
            LidarOutput {
                variant,
                name: config.lidar.name.clone(),
                frame_id: config.lidar.frame_id.clone(),
                cloud: bus.advertise(&config.lidar.topic),
                labels: bus.advertise(&config.lidar.groundtruth_topic),
                last_seen: None,
            }
        });

        let imu = config.imu.active.then(|| ImuOutput {
            name: config.imu.name.clone(),
            frame_id: config.imu.frame_id.clone(),
            publisher: bus.advertise(&config.imu.topic),
        });

        let pose = config.pose.active.then(|| PoseOutput {
            frame_id: config.pose.frame_id.clone(),
            child_frame_id: config.imu.frame_id.clone(),
            publisher: bus.advertise(&config.pose.topic),
            transform: bus.advertise(&config.pose.transform_topic),
        });

        let imu_rate = config.rates.imu_rate.max(1);
        Self {
            client,
            vehicle: config.simulator.vehicle_name.clone(),
            geometry: config.camera_geometry,
            period: Duration::from_secs_f64(1.0 / imu_rate as f64),
            divisor: config.rates.image_divisor(),
            requests,
            layout,
            cameras,
            lidar,
            imu,
            pose,
            counter: 0,
            ticks: 0,
            stats: BridgeMetricsAggregator::new(),
        }
    }

    /// The batch sent on every image sub-tick
    pub fn requests(&self) -> &[ImageRequest] {
        &self.requests
    }

    pub fn layout(&self) -> &ResponseLayout {
        &self.layout
    }

    pub fn lidar_variant(&self) -> Option<LidarVariant> {
        self.lidar.as_ref().map(|l| l.variant)
    }

    /// Ticks between image sub-ticks
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run statistics so far
    pub fn stats(&self) -> &BridgeMetricsAggregator {
        &self.stats
    }

    /// Run until shutdown, `max_ticks`, or the first error
    #[instrument(name = "poll_loop_run", skip(self, shutdown))]
    pub async fn run(
        mut self,
        mut shutdown: ShutdownSignal,
        max_ticks: Option<u64>,
    ) -> Result<BridgeMetricsAggregator> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            period_ms = self.period.as_millis() as u64,
            divisor = self.divisor,
            cameras = self.cameras.len(),
            requests = self.requests.len(),
            lidar = ?self.lidar_variant(),
            imu = self.imu.is_some(),
            pose = self.pose.is_some(),
            "poll loop started"
        );

        loop {
            if shutdown.is_triggered() {
                info!(ticks = self.ticks, "shutdown requested, poll loop stopping");
                break;
            }
            if max_ticks.is_some_and(|max| self.ticks >= max) {
                info!(ticks = self.ticks, "tick limit reached");
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.wait() => {
                    info!(ticks = self.ticks, "shutdown requested, poll loop stopping");
                    break;
                }
            }

            let report = self.tick().await?;
            record_tick_metrics(&report);
        }

        Ok(self.stats)
    }

    /// Execute one tick body
    pub async fn tick(&mut self) -> Result<TickReport> {
        let started = Instant::now();
        self.ticks += 1;
        self.counter += 1;

        let mut report = TickReport {
            tick: self.ticks,
            ..Default::default()
        };

        if self.counter >= self.divisor {
            self.counter = 0;
            report.image_subtick = true;
            report.images_published = self.image_subtick().await?;
            report.lidar = self.lidar_subtick().await?;
        }

        report.imu_published = self.publish_imu().await?;
        report.pose_published = self.publish_pose().await?;

        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats.update(&report);
        Ok(report)
    }

    #[instrument(name = "poll_image_subtick", skip(self), fields(tick = self.ticks))]
    async fn image_subtick(&mut self) -> Result<u32> {
        if self.requests.is_empty() {
            return Ok(0);
        }

        let mut responses = timed(
            "simGetImages",
            self.client.sim_get_images(&self.requests, &self.vehicle),
        )
        .await?;
        if responses.len() < self.layout.len() {
            return Err(BridgeError::ShortResponseBatch {
                expected: self.layout.len(),
                actual: responses.len(),
            });
        }

        let stamp = Stamp::now();
        let mut published = 0;
        for camera in &self.cameras {
            let slots = camera.slots;
            let scene = std::mem::take(&mut responses[slots.scene].image_data_uint8).into_vec();
            if scene.len() <= 1 {
                debug!(camera = %camera.settings.slot, "empty scene buffer, camera skipped");
                continue;
            }

            // Convert everything first so a bad buffer publishes nothing
            let header = Header::new(stamp, &camera.settings.frame_id);
            let source = camera.settings.slot.label();
            let mut images = vec![(
                &camera.scene,
                convert::scene_image(header.clone(), scene, self.geometry, camera.settings.mono, source)?,
            )];

            if let (Some(index), Some(publisher)) = (slots.segmentation, &camera.segmentation) {
                let data = image_bytes(&responses[index], ImageType::Segmentation);
                let msg = convert::segmentation_image(header.clone(), data, self.geometry, source)?;
                images.push((publisher, msg));
            }

            if let (Some(index), Some(publisher)) = (slots.depth, &camera.depth) {
                let msg = convert::depth_image(
                    header.clone(),
                    &responses[index].image_data_float,
                    self.geometry,
                    source,
                )?;
                images.push((publisher, msg));
            }

            for (publisher, msg) in images {
                publish(publisher, BusMessage::Image(msg));
                published += 1;
            }
        }
        Ok(published)
    }

    #[instrument(name = "poll_lidar_subtick", skip(self), fields(tick = self.ticks))]
    async fn lidar_subtick(&mut self) -> Result<Option<LidarOutcome>> {
        let Some(lidar) = self.lidar.as_mut() else {
            return Ok(None);
        };

        let frame = match lidar.variant {
            LidarVariant::Gpu => {
                timed(
                    "getGPULidarData",
                    self.client.get_gpu_lidar_data(&lidar.name, &self.vehicle),
                )
                .await?
            }
            LidarVariant::RayCast => {
                timed(
                    "getLidarData",
                    self.client.get_lidar_data(&lidar.name, &self.vehicle),
                )
                .await?
            }
        };

        if lidar.last_seen == Some(frame.time_stamp) {
            return Ok(Some(LidarOutcome::Duplicate));
        }
        lidar.last_seen = Some(frame.time_stamp);

        if frame.point_cloud.len() < 4 {
            debug!(time_stamp = frame.time_stamp, "LIDAR frame without points");
            return Ok(Some(LidarOutcome::Empty));
        }

        let points = convert::lidar_points(&frame.point_cloud);
        let header = Header::new(Stamp::now(), &lidar.frame_id);
        let cloud = PointCloudMsg::xyz32(header.clone(), &points);
        publish(&lidar.cloud, BusMessage::PointCloud(cloud));
        publish(
            &lidar.labels,
            BusMessage::StringArray(StringArrayMsg {
                header,
                data: frame.groundtruth,
            }),
        );

        Ok(Some(LidarOutcome::Published {
            points: points.len(),
        }))
    }

    async fn publish_imu(&self) -> Result<bool> {
        let Some(imu) = &self.imu else {
            return Ok(false);
        };
        let sample = timed(
            "getImuData",
            self.client.get_imu_data(&imu.name, &self.vehicle),
        )
        .await?;
        let msg = convert::imu_msg(Header::new(Stamp::now(), &imu.frame_id), &sample, &imu.name)?;
        publish(&imu.publisher, BusMessage::Imu(msg));
        Ok(true)
    }

    async fn publish_pose(&self) -> Result<bool> {
        let Some(pose) = &self.pose else {
            return Ok(false);
        };
        let vehicle_pose = timed(
            "simGetVehiclePose",
            self.client.sim_get_vehicle_pose(&self.vehicle),
        )
        .await?;
        let msg = convert::pose_stamped(
            Header::new(Stamp::now(), &pose.frame_id),
            &vehicle_pose,
            "vehicle_pose",
        )?;
        let transform = convert::transform_from_pose(msg.header.clone(), &pose.child_frame_id, &msg.pose);
        publish(&pose.publisher, BusMessage::PoseStamped(msg));
        publish(&pose.transform, BusMessage::TransformStamped(transform));
        Ok(true)
    }
}

pub(crate) fn publish(publisher: &Publisher, message: BusMessage) {
    record_message_published(publisher.topic(), message.kind());
    publisher.publish(message);
}
