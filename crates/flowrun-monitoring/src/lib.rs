//! Logging and run metrics for the Flowrun platform.
//!
//! Library crates log through `tracing`; binaries and test harnesses call
//! [`init_logging`] once to install a subscriber.

use std::env;
use tracing::warn;

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogExt};
pub use metrics::RunMetrics;

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log level filter (e.g., "info,flowrun_core=debug")
    pub log_filter: String,
    /// Emit JSON lines instead of the pretty development format
    pub enable_json_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "flowrun".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from `FLOWRUN_LOG`, `FLOWRUN_LOG_JSON` and
    /// `FLOWRUN_SERVICE_NAME`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(filter) = lookup("FLOWRUN_LOG") {
            config.log_filter = filter;
        }

        if let Some(json) = lookup("FLOWRUN_LOG_JSON") {
            match json.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.enable_json_logging = true,
                "0" | "false" | "no" => config.enable_json_logging = false,
                other => warn!("Invalid FLOWRUN_LOG_JSON value: {}", other),
            }
        }

        if let Some(name) = lookup("FLOWRUN_SERVICE_NAME") {
            config.service_name = name;
        }

        config
    }
}
