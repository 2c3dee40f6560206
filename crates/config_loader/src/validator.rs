//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the contract types (rates > 0, geometry > 0, ...)
//! - rate <= imu_rate (the image pass is a divisor of the main loop)
//! - sink names unique

use std::collections::HashSet;

use contracts::{BridgeConfig, ContractError};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a BridgeConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &BridgeConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_rates(config)?;
    validate_sinks(config)?;
    Ok(())
}

/// Field-level rules declared with `#[validate(...)]`
fn validate_fields(config: &BridgeConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_error("", &errors)
                .unwrap_or_else(|| ("<root>".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Flatten the nested error tree down to its first leaf (stable order)
fn first_error(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = match &err.message {
                        Some(m) => m.to_string(),
                        None => match err.params.get("value") {
                            Some(value) => format!("failed '{}' check, got {}", err.code, value),
                            None => format!("failed '{}' check", err.code),
                        },
                    };
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_error(&path, inner) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_error(&format!("{path}[{idx}]"), inner) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// The image pass runs every `imu_rate / rate` ticks, so it cannot be faster
fn validate_rates(config: &BridgeConfig) -> Result<(), ContractError> {
    let rates = &config.rates;
    if rates.rate > rates.imu_rate {
        return Err(ContractError::config_validation(
            "rates.rate / rates.imu_rate",
            format!(
                "rate ({}) must be <= imu_rate ({})",
                rates.rate, rates.imu_rate
            ),
        ));
    }
    Ok(())
}

/// Sink names must be unique
fn validate_sinks(config: &BridgeConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in &config.sinks {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
