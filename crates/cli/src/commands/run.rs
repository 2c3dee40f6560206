//! `run` command implementation.

use anyhow::{Context, Result};
use bridge::Shutdown;
use contracts::BridgeConfig;
use std::time::Duration;
use tracing::{info, warn};

use super::{collect_warnings, load_config};
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = load_config(&args.config)?;

    // Apply CLI overrides
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding simulator host from CLI");
        config.simulator.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding simulator port from CLI");
        config.simulator.port = port;
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        host = %config.simulator.host,
        port = config.simulator.port,
        vehicle = %config.simulator.vehicle_name,
        rate = config.rates.rate,
        imu_rate = config.rates.imu_rate,
        sinks = config.sinks.len(),
        "Configuration loaded"
    );
    for warning in collect_warnings(&config) {
        warn!("{warning}");
    }

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        bridge: config,
        max_ticks: (args.max_ticks > 0).then_some(args.max_ticks),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        mock: args.mock,
    });

    // Ctrl+C / SIGTERM stop the loop at the next tick
    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("Received shutdown signal, stopping bridge...");
        shutdown.trigger();
    });

    info!("Starting bridge...");
    let stats = pipeline.run(signal).await.context("Bridge execution failed")?;

    info!(
        ticks = stats.report.poll.ticks,
        duration_secs = stats.duration.as_secs_f64(),
        tick_rate = format!("{:.2}", stats.tick_rate()),
        "Bridge completed successfully"
    );
    stats.print_summary();

    info!("AirSim Bridge finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &BridgeConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Simulator:");
    println!("  Address: {}:{}", config.simulator.host, config.simulator.port);
    println!("  Vehicle: {}", config.simulator.vehicle_name);
    println!(
        "\nRates: {} Hz images, {} Hz IMU (sub-tick every {} ticks)",
        config.rates.rate,
        config.rates.imu_rate,
        config.rates.image_divisor()
    );

    println!("\nCameras:");
    for camera in config.cameras.resolve() {
        if camera.active {
            println!(
                "  - {} '{}'{}{}",
                camera.slot,
                camera.name,
                if camera.scene_only { " scene-only" } else { "" },
                if camera.mono { " mono" } else { "" }
            );
        } else {
            println!("  - {} (inactive)", camera.slot);
        }
    }

    println!(
        "\nLIDAR: {}",
        match (config.lidar.gpu_active, config.lidar.active) {
            (true, _) => "gpu",
            (false, true) => "ray-cast",
            (false, false) => "off",
        }
    );
    println!("IMU: {}", if config.imu.active { "on" } else { "off" });
    println!("Pose: {}", if config.pose.active { "on" } else { "off" });
    println!(
        "Car control: {}",
        if config.car_control.active { "on" } else { "off" }
    );

    if !config.sinks.is_empty() {
        println!("\nSinks ({}):", config.sinks.len());
        for sink in &config.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
