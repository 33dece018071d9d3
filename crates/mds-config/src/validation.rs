// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: required durations, non-zero intervals and buffer sizes.

use crate::diagnostic::ConfigError;
use crate::model::MdsConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MdsConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(ConfigError::invalid(
            "log_level",
            format!("`{}` is not one of {}", config.log_level, LOG_LEVELS.join(", ")),
        ));
    }

    if config.storage.data_dir.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.data_dir", "must not be empty"));
    }

    let positive = [
        ("bus.capacity", config.bus.capacity as u64),
        ("outbox.relay_interval_ms", config.outbox.relay_interval_ms),
        ("outbox.batch_size", config.outbox.batch_size as u64),
        (
            "logistics.periodic_delivery_check_interval_secs",
            config.logistics.periodic_delivery_check_interval_secs,
        ),
        (
            "radio.pickup_timeout_check_interval_secs",
            config.radio.pickup_timeout_check_interval_secs,
        ),
        ("radio.notify_request_buffer", config.radio.notify_request_buffer as u64),
    ];
    for (key, value) in positive {
        if value == 0 {
            errors.push(ConfigError::invalid(key, "must be greater than zero"));
        }
    }

    match config.radio.pickup_timeout_secs {
        None => errors.push(ConfigError::missing("radio.pickup_timeout_secs")),
        Some(0) => errors.push(ConfigError::invalid(
            "radio.pickup_timeout_secs",
            "must be greater than zero",
        )),
        Some(_) => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
