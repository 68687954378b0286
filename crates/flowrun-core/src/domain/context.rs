//! The execution context threaded through a run.
//!
//! Every update consumes the context and returns the next one, so a snapshot
//! handed to the progress reporter can never change underneath it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::{
    step::{StepOutput, StepStatus},
    verdict::ExecutionVerdict,
};

/// Scope key under which the trigger payload is visible to expressions
pub const TRIGGER_SCOPE_KEY: &str = "trigger";

/// Accumulated state of one run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Trigger payload seeded by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trigger: Option<Value>,

    /// Step outputs keyed by step name
    #[serde(default)]
    steps: HashMap<String, StepOutput>,

    /// Last measured duration per step name
    #[serde(default)]
    step_durations: HashMap<String, Duration>,

    /// Total elapsed time, stamped when a chain finishes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<Duration>,

    /// Current run status
    #[serde(default)]
    verdict: ExecutionVerdict,
}

impl ExecutionContext {
    /// Empty, running context
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the trigger payload
    pub fn with_trigger_payload(mut self, payload: Value) -> Self {
        self.trigger = Some(payload);
        self
    }

    /// Insert or replace the output of `step_name`
    pub fn upsert_step(mut self, step_name: impl Into<String>, output: StepOutput) -> Self {
        self.steps.insert(step_name.into(), output);
        self
    }

    /// Record a failed step and move the run to a failed verdict
    pub fn fail_step(self, step_name: impl Into<String>, output: StepOutput) -> Self {
        let step_name = step_name.into();
        let message = output
            .error_message
            .clone()
            .unwrap_or_else(|| format!("Step {} failed", step_name));
        let output = output.with_status(StepStatus::Failed);

        self.upsert_step(step_name.clone(), output)
            .set_verdict(ExecutionVerdict::failed(step_name, message))
    }

    /// Drop the outputs of `step_names`, keeping their recorded durations
    pub fn clear_steps<'a>(mut self, step_names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in step_names {
            self.steps.remove(name);
        }
        self
    }

    /// Replace the verdict
    pub fn set_verdict(mut self, verdict: ExecutionVerdict) -> Self {
        self.verdict = verdict;
        self
    }

    /// Record the measured duration of `step_name`, replacing any earlier one
    pub fn set_step_duration(mut self, step_name: impl Into<String>, duration: Duration) -> Self {
        self.step_durations.insert(step_name.into(), duration);
        self
    }

    /// Record the total elapsed time
    pub fn set_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Current verdict
    #[inline]
    pub fn verdict(&self) -> &ExecutionVerdict {
        &self.verdict
    }

    /// Whether the run loop may continue
    #[inline]
    pub fn is_running(&self) -> bool {
        self.verdict.is_running()
    }

    /// Trigger payload, if seeded
    pub fn trigger_payload(&self) -> Option<&Value> {
        self.trigger.as_ref()
    }

    /// Output of a step
    pub fn step(&self, step_name: &str) -> Option<&StepOutput> {
        self.steps.get(step_name)
    }

    /// All step outputs
    pub fn steps(&self) -> &HashMap<String, StepOutput> {
        &self.steps
    }

    /// Measured duration of a step
    pub fn step_duration(&self, step_name: &str) -> Option<Duration> {
        self.step_durations.get(step_name).copied()
    }

    /// All measured step durations
    pub fn step_durations(&self) -> &HashMap<String, Duration> {
        &self.step_durations
    }

    /// Total elapsed time, once stamped
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// JSON view used by expressions: the trigger payload under `trigger`
    /// and each step's produced value under its name
    pub fn scope(&self) -> Value {
        let mut scope = Map::with_capacity(self.steps.len() + 1);

        if let Some(trigger) = &self.trigger {
            scope.insert(TRIGGER_SCOPE_KEY.to_string(), trigger.clone());
        }

        for (name, step) in &self.steps {
            scope.insert(name.clone(), step.output.clone().unwrap_or(Value::Null));
        }

        Value::Object(scope)
    }
}
