//! # Queue Engine Configuration
//!
//! Layered configuration for queue names, status topic sizing, scanning
//! service defaults and monitor output.
//!
//! ## Architecture
//!
//! - **Safe Defaults**: [`EngineConfig::default`] works without any files
//! - **YAML Files**: `config/queue-engine.yaml`, then
//!   `config/queue-engine.<environment>.yaml`
//! - **Environment Overrides**: `QUEUE_ENGINE__SECTION__KEY` variables win
//!   over files
//! - **Explicit Validation**: loaded values are checked before use
//!
//! ## Usage
//!
//! ```rust,no_run
//! use atom_queue_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let capacity = manager.config().events.channel_capacity;
//! let job_queue = &manager.config().queues.job_queue_name;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::defaults;

/// Root configuration for the queue engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub queues: QueuesConfig,
    pub events: EventsConfig,
    pub scanning: ScanningConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuesConfig {
    pub job_queue_name: String,
    /// Prefix for the identifiers of dynamically registered active queues
    pub active_queue_prefix: String,
    pub status_topic_suffix: String,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            job_queue_name: defaults::JOB_QUEUE_NAME.to_string(),
            active_queue_prefix: defaults::ACTIVE_QUEUE_PREFIX.to_string(),
            status_topic_suffix: defaults::STATUS_TOPIC_SUFFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Capacity of each status topic's broadcast channel for raw
    /// receivers. Listeners attached through a subscription are unbounded.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Where scans go when a scan atom does not say otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    pub broker_uri: String,
    pub status_topic: String,
    pub submit_queue: String,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            broker_uri: defaults::SCAN_BROKER_URI.to_string(),
            status_topic: defaults::SCAN_STATUS_TOPIC.to_string(),
            submit_queue: defaults::SCAN_SUBMIT_QUEUE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory monitor sample files are written to
    pub temp_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("queue-engine"),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queues.job_queue_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "queues.job_queue_name",
                &self.queues.job_queue_name,
                "must not be empty",
            ));
        }
        if self.queues.active_queue_prefix.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "queues.active_queue_prefix",
                &self.queues.active_queue_prefix,
                "must not be empty",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "must be at least 1",
            ));
        }
        if !self.scanning.broker_uri.contains("://") {
            return Err(ConfigurationError::invalid_value(
                "scanning.broker_uri",
                &self.scanning.broker_uri,
                "must be of the form scheme://host",
            ));
        }
        if self.monitor.temp_dir.as_os_str().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "monitor.temp_dir",
                "",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Status topic name for a queue
    pub fn status_topic_for(&self, queue_id: &str) -> String {
        format!("{queue_id}{}", self.queues.status_topic_suffix)
    }
}
