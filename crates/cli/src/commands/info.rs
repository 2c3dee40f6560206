//! `info` command implementation.

use anyhow::{Context, Result};
use bridge::{build_requests, ResponseLayout};
use contracts::{BridgeConfig, CameraSettings};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    simulator: SimulatorInfo,
    rates: RateInfo,
    cameras: Vec<CameraInfo>,
    requests: Vec<RequestInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    topics: Vec<TopicInfo>,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SimulatorInfo {
    host: String,
    port: u16,
    vehicle_name: String,
}

#[derive(Serialize)]
struct RateInfo {
    rate: u32,
    imu_rate: u32,
    image_divisor: u32,
}

#[derive(Serialize)]
struct CameraInfo {
    #[serde(flatten)]
    settings: CameraSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    slots: Option<bridge::CameraSlots>,
}

#[derive(Serialize)]
struct RequestInfo {
    index: usize,
    camera_name: String,
    image_type: String,
    pixels_as_float: bool,
}

#[derive(Serialize)]
struct TopicInfo {
    topic: String,
    direction: &'static str,
    kind: &'static str,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)?;
    let info = build_config_info(&config, args.topics);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &BridgeConfig, with_topics: bool) -> ConfigInfo {
    let cameras = config.cameras.resolve();
    let layout = ResponseLayout::from_settings(&cameras);
    let requests = build_requests(&cameras)
        .into_iter()
        .enumerate()
        .map(|(index, r)| RequestInfo {
            index,
            camera_name: r.camera_name,
            image_type: format!("{:?}", r.image_type),
            pixels_as_float: r.pixels_as_float,
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        simulator: SimulatorInfo {
            host: config.simulator.host.clone(),
            port: config.simulator.port,
            vehicle_name: config.simulator.vehicle_name.clone(),
        },
        rates: RateInfo {
            rate: config.rates.rate,
            imu_rate: config.rates.imu_rate,
            image_divisor: config.rates.image_divisor(),
        },
        topics: if with_topics {
            topics(config, &cameras, &layout)
        } else {
            Vec::new()
        },
        cameras: cameras
            .into_iter()
            .map(|settings| CameraInfo {
                slots: layout.camera(settings.slot),
                settings,
            })
            .collect(),
        requests,
        sinks: config
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
            })
            .collect(),
    }
}

/// Every topic the bridge publishes or listens on
fn topics(
    config: &BridgeConfig,
    cameras: &[CameraSettings; 3],
    layout: &ResponseLayout,
) -> Vec<TopicInfo> {
    let out = |topic: &str, kind| TopicInfo {
        topic: topic.to_string(),
        direction: "out",
        kind,
    };
    let mut topics = Vec::new();

    for camera in cameras {
        let Some(slots) = layout.camera(camera.slot) else {
            continue;
        };
        topics.push(out(&camera.scene_topic, "image"));
        if slots.segmentation.is_some() {
            topics.push(out(&camera.segmentation_topic, "image"));
        }
        if slots.depth.is_some() {
            topics.push(out(&camera.depth_topic, "image"));
        }
    }
    if config.lidar.enabled() {
        topics.push(out(&config.lidar.topic, "point_cloud"));
        topics.push(out(&config.lidar.groundtruth_topic, "string_array"));
    }
    if config.imu.active {
        topics.push(out(&config.imu.topic, "imu"));
    }
    if config.pose.active {
        topics.push(out(&config.pose.topic, "pose_stamped"));
        topics.push(out(&config.pose.transform_topic, "transform_stamped"));
        topics.push(TopicInfo {
            topic: config.pose.override_topic.clone(),
            direction: "in",
            kind: "pose_stamped",
        });
    }
    if config.car_control.active {
        topics.push(TopicInfo {
            topic: config.car_control.input_topic.clone(),
            direction: "in",
            kind: "twist",
        });
    }
    topics
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== AirSim Bridge Configuration ===\n");

    println!("Simulator");
    println!("   ├─ Version: {}", info.version);
    println!(
        "   ├─ Address: {}:{}",
        info.simulator.host, info.simulator.port
    );
    println!("   └─ Vehicle: {}", info.simulator.vehicle_name);

    println!("\nRates");
    println!("   ├─ Images: {} Hz", info.rates.rate);
    println!("   ├─ IMU loop: {} Hz", info.rates.imu_rate);
    println!("   └─ Sub-tick every {} ticks", info.rates.image_divisor);

    println!("\nCameras");
    for (i, camera) in info.cameras.iter().enumerate() {
        let prefix = if i == info.cameras.len() - 1 { "└─" } else { "├─" };
        match camera.slots {
            Some(slots) => println!(
                "   {} {} '{}' -> scene {}, segmentation {}, depth {}{}",
                prefix,
                camera.settings.slot,
                camera.settings.name,
                slots.scene,
                slot_label(slots.segmentation),
                slot_label(slots.depth),
                if camera.settings.mono { " (mono)" } else { "" }
            ),
            None => println!("   {} {} (inactive)", prefix, camera.settings.slot),
        }
    }

    println!("\nRequest batch ({})", info.requests.len());
    for (i, request) in info.requests.iter().enumerate() {
        let prefix = if i == info.requests.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} [{}] {} {}{}",
            prefix,
            request.index,
            request.camera_name,
            request.image_type,
            if request.pixels_as_float { " (float)" } else { "" }
        );
    }

    if !info.topics.is_empty() {
        println!("\nTopics ({})", info.topics.len());
        for (i, topic) in info.topics.iter().enumerate() {
            let prefix = if i == info.topics.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {:<3} {} ({})",
                prefix, topic.direction, topic.topic, topic.kind
            );
        }
    }

    if !info.sinks.is_empty() {
        println!("\nSinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i == info.sinks.len() - 1 { "└─" } else { "├─" };
            println!("   {} {} ({})", prefix, sink.name, sink.sink_type);
        }
    }

    println!();
}

fn slot_label(slot: Option<usize>) -> String {
    slot.map_or_else(|| "-".to_string(), |i| i.to_string())
}
