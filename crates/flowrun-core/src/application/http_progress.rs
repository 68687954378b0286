//! Progress delivery over HTTP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowrun_monitoring::metrics::duration_ms;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

use crate::{
    application::progress::{ProgressService, ProgressUpdate},
    domain::{step::StepOutput, verdict::ExecutionVerdict},
    CoreError,
};

/// JSON body posted to the progress endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload<'a> {
    /// Flow being executed
    pub flow_id: &'a str,
    /// Run identifier
    pub flow_run_id: &'a str,
    /// Current verdict
    pub verdict: &'a ExecutionVerdict,
    /// Step outputs so far
    pub steps: &'a HashMap<String, StepOutput>,
    /// Step durations in milliseconds, sorted by step name
    pub step_durations_ms: BTreeMap<&'a str, f64>,
    /// Total duration in milliseconds, once stamped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Duration of the step that just finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_step_duration_ms: Option<f64>,
    /// When the update was produced
    pub sent_at: DateTime<Utc>,
}

impl<'a> ProgressPayload<'a> {
    /// Build the wire body for `update`
    pub fn from_update(update: &'a ProgressUpdate) -> Self {
        let context = &update.context;
        Self {
            flow_id: &update.constants.flow_id,
            flow_run_id: &update.constants.flow_run_id,
            verdict: context.verdict(),
            steps: context.steps(),
            step_durations_ms: context
                .step_durations()
                .iter()
                .map(|(name, duration)| (name.as_str(), duration_ms(*duration)))
                .collect(),
            duration_ms: context.duration().map(duration_ms),
            last_step_duration_ms: update.last_step_duration.map(duration_ms),
            sent_at: update.sent_at,
        }
    }
}

/// Posts progress snapshots to `EngineConstants::progress_url`
///
/// Each request is bounded by `EngineConstants::progress_timeout`, so a
/// stalled endpoint cannot keep delivery tasks alive past that limit.
#[derive(Debug, Clone, Default)]
pub struct HttpProgressService {
    client: reqwest::Client,
}

impl HttpProgressService {
    /// Service with a default HTTP client
    pub fn new() -> Self {
        Self::default()
    }

    /// Service using a preconfigured client (timeouts, proxies, TLS)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressService for HttpProgressService {
    async fn send_update(&self, update: ProgressUpdate) -> Result<(), CoreError> {
        let Some(url) = update.constants.progress_url.as_deref() else {
            trace!(flow_run_id = %update.constants.flow_run_id, "No progress URL configured");
            return Ok(());
        };

        let payload = ProgressPayload::from_update(&update);
        let mut request = self
            .client
            .post(url)
            .timeout(update.constants.progress_timeout())
            .json(&payload);
        if let Some(token) = &update.constants.engine_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::ProgressError(format!(
                "Progress endpoint {} returned {}",
                url, status
            )));
        }

        debug!(
            flow_run_id = %update.constants.flow_run_id,
            verdict = %update.context.verdict(),
            "Progress update delivered"
        );
        Ok(())
    }
}
