//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Fill defaults for every missing parameter
//! - Validate the few constraints the poll loop depends on
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("bridge.toml")).unwrap();
//! println!("Simulator: {}:{}", config.simulator.host, config.simulator.port);
//! ```

mod parser;
mod validator;

pub use contracts::BridgeConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<BridgeConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<BridgeConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already-built configuration (e.g. after CLI overrides)
    pub fn validate(config: &BridgeConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize BridgeConfig to TOML string
    pub fn to_toml(config: &BridgeConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize BridgeConfig to JSON string
    pub fn to_json(config: &BridgeConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<BridgeConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TOML: &str = r#"
[simulator]
host = "192.168.1.20"
vehicle_name = "ego"

[rates]
rate = 20
imu_rate = 200

[cameras.camera1]
mono = true

[cameras.camera2]
scene_only = true

[cameras.camera3]
active = false

[car_control]
active = true

[bus]
ingress_addr = "127.0.0.1:9870"

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(SAMPLE_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.simulator.host, "192.168.1.20");
        assert_eq!(config.simulator.port, 41451);
        assert_eq!(config.rates.image_divisor(), 10);
        assert!(config.cameras.camera1.mono);
        assert!(!config.cameras.camera3.active);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(SAMPLE_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let again = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.simulator.host, again.simulator.host);
        assert_eq!(config.sinks.len(), again.sinks.len());
        assert_eq!(config.bus.ingress_addr, again.bus.ingress_addr);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(SAMPLE_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.rates.rate, again.rates.rate);
        assert_eq!(config.cameras.camera2.scene_only, again.cameras.camera2.scene_only);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[rates]
rate = 50
imu_rate = 10
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("imu_rate"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = std::env::temp_dir().join(format!("config_loader_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bridge.toml");
        std::fs::write(&path, SAMPLE_TOML).unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.simulator.vehicle_name, "ego");

        let bad = dir.join("bridge.yaml");
        std::fs::write(&bad, "").unwrap();
        assert!(ConfigLoader::load_from_path(&bad).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
