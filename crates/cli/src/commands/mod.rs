//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_bridge;
pub use validate::run_validate;

use std::path::Path;

use contracts::BridgeConfig;

use crate::error::{CliError, Result};

/// Load and validate a configuration file
pub(crate) fn load_config(path: &Path) -> Result<BridgeConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config(path.display().to_string(), e))
}

/// Non-fatal configuration issues
pub(crate) fn collect_warnings(config: &BridgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.lidar.active && config.lidar.gpu_active {
        warnings.push("lidar.active and lidar.gpu_active both set - only the GPU LIDAR is polled".to_string());
    }

    if config.car_control.active && config.bus.ingress_addr.is_none() {
        warnings.push(format!(
            "car_control is active but bus.ingress_addr is unset - nothing can publish on '{}'",
            config.car_control.input_topic
        ));
    }

    if config.pose.active && config.bus.ingress_addr.is_none() {
        warnings.push(format!(
            "bus.ingress_addr is unset - pose overrides on '{}' can only come from inside the process",
            config.pose.override_topic
        ));
    }

    let cameras = config.cameras.resolve();
    if cameras.iter().all(|c| !c.active) {
        warnings.push("No active cameras - image sub-ticks will be skipped".to_string());
    }

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - bus traffic stays in process".to_string());
    }

    warnings
}
