//! Run-scoped engine configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Default upper bound on items a single loop step may iterate
pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 1000;

/// Default time limit for one progress delivery, in milliseconds
pub const DEFAULT_PROGRESS_TIMEOUT_MS: u64 = 30_000;

/// Read-only configuration handed to every step executor
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConstants {
    /// Flow being executed
    #[serde(default)]
    pub flow_id: String,

    /// Identifier of this run
    #[serde(default = "new_run_id")]
    pub flow_run_id: String,

    /// Endpoint receiving progress snapshots; progress is not sent when unset
    #[serde(default)]
    pub progress_url: Option<String>,

    /// Bearer token presented to the progress endpoint
    #[serde(default, skip_serializing)]
    pub engine_token: Option<String>,

    /// Largest collection a loop step accepts
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: usize,

    /// Per-step time limit applied by code and piece steps, in milliseconds
    #[serde(default)]
    pub step_timeout_ms: Option<u64>,

    /// Time limit for one progress delivery, in milliseconds
    #[serde(default = "default_progress_timeout_ms")]
    pub progress_timeout_ms: u64,
}

fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_max_loop_iterations() -> usize {
    DEFAULT_MAX_LOOP_ITERATIONS
}

fn default_progress_timeout_ms() -> u64 {
    DEFAULT_PROGRESS_TIMEOUT_MS
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn parse_positive_secs(key: &str, value: &str) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs.saturating_mul(1000)),
        _ => {
            warn!("Invalid {} value: {}", key, value);
            None
        }
    }
}

impl Default for EngineConstants {
    fn default() -> Self {
        Self {
            flow_id: String::new(),
            flow_run_id: new_run_id(),
            progress_url: None,
            engine_token: None,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            step_timeout_ms: None,
            progress_timeout_ms: DEFAULT_PROGRESS_TIMEOUT_MS,
        }
    }
}

// Hand-written so the engine token never reaches the logs
impl fmt::Debug for EngineConstants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConstants")
            .field("flow_id", &self.flow_id)
            .field("flow_run_id", &self.flow_run_id)
            .field("progress_url", &self.progress_url)
            .field("engine_token", &self.engine_token.as_ref().map(|_| "<redacted>"))
            .field("max_loop_iterations", &self.max_loop_iterations)
            .field("step_timeout_ms", &self.step_timeout_ms)
            .field("progress_timeout_ms", &self.progress_timeout_ms)
            .finish()
    }
}

impl EngineConstants {
    /// Constants for `flow_id` with a fresh run id
    pub fn for_flow(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            ..Self::default()
        }
    }

    /// Load constants from `FLOWRUN_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Start with defaults
        let mut constants = Self::default();

        if let Some(flow_id) = lookup("FLOWRUN_FLOW_ID") {
            constants.flow_id = flow_id;
        }

        if let Some(run_id) = lookup("FLOWRUN_FLOW_RUN_ID") {
            constants.flow_run_id = run_id;
        }

        if let Some(url) = lookup("FLOWRUN_PROGRESS_URL") {
            constants.progress_url = Some(url);
        }

        if let Some(token) = lookup("FLOWRUN_ENGINE_TOKEN") {
            constants.engine_token = Some(token);
        }

        if let Some(max) = lookup("FLOWRUN_MAX_LOOP_ITERATIONS") {
            match max.parse::<usize>() {
                Ok(max) => constants.max_loop_iterations = max,
                Err(_) => warn!("Invalid FLOWRUN_MAX_LOOP_ITERATIONS value: {}", max),
            }
        }

        if let Some(timeout) = lookup("FLOWRUN_STEP_TIMEOUT_SECS") {
            if let Some(ms) = parse_positive_secs("FLOWRUN_STEP_TIMEOUT_SECS", &timeout) {
                constants.step_timeout_ms = Some(ms);
            }
        }

        if let Some(timeout) = lookup("FLOWRUN_PROGRESS_TIMEOUT_SECS") {
            if let Some(ms) = parse_positive_secs("FLOWRUN_PROGRESS_TIMEOUT_SECS", &timeout) {
                constants.progress_timeout_ms = ms;
            }
        }

        constants
    }

    /// Set the per-step time limit
    ///
    /// Kept at millisecond precision; anything shorter becomes 1ms.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = Some(duration_to_ms(timeout));
        self
    }

    /// Set the time limit for one progress delivery
    pub fn with_progress_timeout(mut self, timeout: Duration) -> Self {
        self.progress_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Set the loop bound
    pub fn with_max_loop_iterations(mut self, max: usize) -> Self {
        self.max_loop_iterations = max;
        self
    }

    /// Per-step time limit, if any
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }

    /// Time limit for one progress delivery
    pub fn progress_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let constants = EngineConstants::default();
        assert_eq!(constants.max_loop_iterations, DEFAULT_MAX_LOOP_ITERATIONS);
        assert!(constants.progress_url.is_none());
        assert!(constants.step_timeout().is_none());
        assert_eq!(constants.progress_timeout(), Duration::from_secs(30));
        assert!(Uuid::parse_str(&constants.flow_run_id).is_ok());
        assert_ne!(constants.flow_run_id, EngineConstants::default().flow_run_id);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let constants = EngineConstants::from_lookup(lookup_from(&[
            ("FLOWRUN_FLOW_ID", "flow-1"),
            ("FLOWRUN_FLOW_RUN_ID", "run-1"),
            ("FLOWRUN_PROGRESS_URL", "http://localhost:3000/v1/engine/update-run"),
            ("FLOWRUN_ENGINE_TOKEN", "secret"),
            ("FLOWRUN_MAX_LOOP_ITERATIONS", "25"),
            ("FLOWRUN_STEP_TIMEOUT_SECS", "30"),
            ("FLOWRUN_PROGRESS_TIMEOUT_SECS", "5"),
        ]));

        assert_eq!(constants.flow_id, "flow-1");
        assert_eq!(constants.flow_run_id, "run-1");
        assert_eq!(
            constants.progress_url.as_deref(),
            Some("http://localhost:3000/v1/engine/update-run")
        );
        assert_eq!(constants.engine_token.as_deref(), Some("secret"));
        assert_eq!(constants.max_loop_iterations, 25);
        assert_eq!(constants.step_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(constants.progress_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_sub_second_timeouts_keep_precision() {
        let constants = EngineConstants::default()
            .with_step_timeout(Duration::from_millis(250))
            .with_progress_timeout(Duration::from_millis(1500));

        assert_eq!(constants.step_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(constants.progress_timeout(), Duration::from_millis(1500));

        let tiny = EngineConstants::default().with_step_timeout(Duration::from_micros(10));
        assert_eq!(tiny.step_timeout(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let constants = EngineConstants::from_lookup(lookup_from(&[
            ("FLOWRUN_MAX_LOOP_ITERATIONS", "lots"),
            ("FLOWRUN_STEP_TIMEOUT_SECS", "0"),
            ("FLOWRUN_PROGRESS_TIMEOUT_SECS", "soon"),
        ]));

        assert_eq!(constants.max_loop_iterations, DEFAULT_MAX_LOOP_ITERATIONS);
        assert!(constants.step_timeout().is_none());
        assert_eq!(constants.progress_timeout_ms, DEFAULT_PROGRESS_TIMEOUT_MS);
    }

    #[test]
    fn test_debug_redacts_token() {
        let constants = EngineConstants {
            engine_token: Some("super-secret".to_string()),
            ..EngineConstants::for_flow("flow-1")
        };

        let printed = format!("{:?}", constants);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let constants: EngineConstants =
            serde_json::from_str(r#"{ "flowId": "flow-9", "engineToken": "t" }"#).unwrap();
        assert_eq!(constants.flow_id, "flow-9");
        assert_eq!(constants.engine_token.as_deref(), Some("t"));
        assert_eq!(constants.max_loop_iterations, DEFAULT_MAX_LOOP_ITERATIONS);
        assert!(!constants.flow_run_id.is_empty());
    }
}
