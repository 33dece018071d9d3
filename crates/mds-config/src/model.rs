// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the MDS delivery engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level MDS configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. Every section defaults except `radio.pickup_timeout_secs`,
/// which validation requires.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MdsConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Event bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Transactional outbox relay settings.
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// Delivery scheduler settings.
    #[serde(default)]
    pub logistics: LogisticsConfig,

    /// Radio-delivery arbiter settings.
    #[serde(default)]
    pub radio: RadioConfig,
}

impl Default for MdsConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            bus: BusConfig::default(),
            outbox: OutboxConfig::default(),
            logistics: LogisticsConfig::default(),
            radio: RadioConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage configuration. Each service keeps its own database file inside
/// `data_dir`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding `logistics.db` and `radio.db`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            wal_mode: default_wal_mode(),
        }
    }
}

impl StorageConfig {
    pub fn logistics_database_path(&self) -> String {
        format!("{}/logistics.db", self.data_dir.trim_end_matches('/'))
    }

    pub fn radio_database_path(&self) -> String {
        format!("{}/radio.db", self.data_dir.trim_end_matches('/'))
    }
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("mds").display().to_string())
        .unwrap_or_else(|| "./data".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Event bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Bus address. Opaque to the engine; `in-process` uses the built-in bus.
    #[serde(default = "default_bus_address")]
    pub address: String,

    /// Buffered events per subscriber before it lags.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: default_bus_address(),
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_address() -> String {
    "in-process".to_string()
}

fn default_bus_capacity() -> usize {
    1024
}

/// Outbox relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutboxConfig {
    /// Fallback poll interval. Commits also wake the relay directly.
    #[serde(default = "default_relay_interval_ms")]
    pub relay_interval_ms: u64,

    /// Maximum events published per relay round.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            relay_interval_ms: default_relay_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl OutboxConfig {
    pub fn relay_interval(&self) -> Duration {
        Duration::from_millis(self.relay_interval_ms)
    }
}

fn default_relay_interval_ms() -> u64 {
    250
}

fn default_batch_size() -> usize {
    256
}

/// Delivery scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogisticsConfig {
    /// Interval between periodic delivery checks.
    #[serde(default = "default_periodic_delivery_check_interval_secs")]
    pub periodic_delivery_check_interval_secs: u64,

    /// A periodic check taking longer than this is logged as a warning.
    #[serde(default = "default_periodic_delivery_warn_threshold_ms")]
    pub periodic_delivery_warn_threshold_ms: u64,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            periodic_delivery_check_interval_secs: default_periodic_delivery_check_interval_secs(),
            periodic_delivery_warn_threshold_ms: default_periodic_delivery_warn_threshold_ms(),
        }
    }
}

impl LogisticsConfig {
    pub fn periodic_delivery_check_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_delivery_check_interval_secs)
    }

    pub fn periodic_delivery_warn_threshold(&self) -> Duration {
        Duration::from_millis(self.periodic_delivery_warn_threshold_ms)
    }
}

fn default_periodic_delivery_check_interval_secs() -> u64 {
    30
}

fn default_periodic_delivery_warn_threshold_ms() -> u64 {
    1000
}

/// Radio-delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RadioConfig {
    /// Interval between pickup-timeout sweeps.
    #[serde(default = "default_pickup_timeout_check_interval_secs")]
    pub pickup_timeout_check_interval_secs: u64,

    /// Picked-up radio deliveries are released after this long. Required.
    #[serde(default)]
    pub pickup_timeout_secs: Option<u64>,

    /// Capacity of the multiplexer's notify-request queue.
    #[serde(default = "default_notify_request_buffer")]
    pub notify_request_buffer: usize,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            pickup_timeout_check_interval_secs: default_pickup_timeout_check_interval_secs(),
            pickup_timeout_secs: None,
            notify_request_buffer: default_notify_request_buffer(),
        }
    }
}

impl RadioConfig {
    pub fn pickup_timeout_check_interval(&self) -> Duration {
        Duration::from_secs(self.pickup_timeout_check_interval_secs)
    }

    /// The configured pickup timeout. Validation guarantees presence.
    pub fn pickup_timeout(&self) -> Option<Duration> {
        self.pickup_timeout_secs.map(Duration::from_secs)
    }
}

fn default_pickup_timeout_check_interval_secs() -> u64 {
    10
}

fn default_notify_request_buffer() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_paths_live_in_data_dir() {
        let storage = StorageConfig {
            data_dir: "/var/lib/mds/".to_string(),
            wal_mode: true,
        };
        assert_eq!(storage.logistics_database_path(), "/var/lib/mds/logistics.db");
        assert_eq!(storage.radio_database_path(), "/var/lib/mds/radio.db");
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = MdsConfig::default();
        assert_eq!(
            config.logistics.periodic_delivery_check_interval(),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.logistics.periodic_delivery_warn_threshold(),
            Duration::from_secs(1)
        );
        assert_eq!(config.radio.notify_request_buffer, 256);
        assert!(config.radio.pickup_timeout().is_none());
    }
}
