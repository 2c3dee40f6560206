//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::BridgeConfig;
use serde::Serialize;
use tracing::info;

use super::{collect_warnings, load_config};
use crate::cli::ValidateArgs;

/// Outcome of loading one config file, also the `--json` output
#[derive(Serialize)]
struct Report {
    config_path: String,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outcome {
    Valid {
        summary: ConfigSummary,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Invalid {
        error: String,
    },
}

impl Report {
    fn is_valid(&self) -> bool {
        matches!(self.outcome, Outcome::Valid { .. })
    }
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    simulator: String,
    active_cameras: usize,
    image_requests: usize,
    lidar: bool,
    imu: bool,
    pose: bool,
    car_control: bool,
    sink_count: usize,
}

impl ConfigSummary {
    fn new(config: &BridgeConfig) -> Self {
        let cameras = config.cameras.resolve();
        Self {
            version: format!("{:?}", config.version),
            simulator: format!("{}:{}", config.simulator.host, config.simulator.port),
            active_cameras: cameras.iter().filter(|c| c.active).count(),
            image_requests: bridge::build_requests(&cameras).len(),
            lidar: config.lidar.enabled(),
            imu: config.imu.active,
            pose: config.pose.active,
            car_control: config.car_control.active,
            sink_count: config.sinks.len(),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let report = check(args);
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }

    if !report.is_valid() {
        anyhow::bail!("{} is not a usable bridge configuration", report.config_path);
    }
    Ok(())
}

fn check(args: &ValidateArgs) -> Report {
    let outcome = match load_config(&args.config) {
        Ok(config) => Outcome::Valid {
            warnings: collect_warnings(&config),
            summary: ConfigSummary::new(&config),
        },
        Err(e) => Outcome::Invalid {
            error: e.to_string(),
        },
    };
    Report {
        config_path: args.config.display().to_string(),
        outcome,
    }
}

fn print_report(report: &Report) {
    match &report.outcome {
        Outcome::Invalid { error } => {
            println!("✗ {}", report.config_path);
            println!("    {error}");
        }
        Outcome::Valid { summary, warnings } => {
            println!("✓ {} (config {})", report.config_path, summary.version);
            println!("    simulator    {}", summary.simulator);
            println!(
                "    cameras      {} active, {} image requests per sub-tick",
                summary.active_cameras, summary.image_requests
            );
            println!(
                "    sensors      lidar {}, imu {}, pose {}",
                on_off(summary.lidar),
                on_off(summary.imu),
                on_off(summary.pose)
            );
            println!("    car control  {}", on_off(summary.car_control));
            println!("    sinks        {}", summary.sink_count);

            for warning in warnings {
                println!("⚠ {warning}");
            }
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
