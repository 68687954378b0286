use crate::{
    domain::{action::ActionType, expression},
    CoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Step started but has not finished (loop steps between iterations)
    Running,
    /// Step finished normally
    Succeeded,
    /// Step failed; the run verdict is terminal
    Failed,
}

/// Recorded result of one step, keyed by step name in the execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    /// Type of the step that produced this output
    #[serde(rename = "type")]
    pub step_type: ActionType,

    /// Step status
    pub status: StepStatus,

    /// Resolved input the step ran with
    #[serde(default)]
    pub input: Value,

    /// Value produced by the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Error message if the step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StepOutput {
    /// Output of a step that has started but not finished
    pub fn running(step_type: ActionType, input: Value) -> Self {
        Self {
            step_type,
            status: StepStatus::Running,
            input,
            output: None,
            error_message: None,
        }
    }

    /// Output of a step that finished normally
    pub fn succeeded(step_type: ActionType, input: Value, output: Value) -> Self {
        Self {
            step_type,
            status: StepStatus::Succeeded,
            input,
            output: Some(output),
            error_message: None,
        }
    }

    /// Output of a step that failed
    pub fn failed(step_type: ActionType, input: Value, message: impl Into<String>) -> Self {
        Self {
            step_type,
            status: StepStatus::Failed,
            input,
            output: None,
            error_message: Some(message.into()),
        }
    }

    /// Replace the produced value
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Replace the status
    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }
}

/// Evaluates a branch condition against the context scope
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate the condition within the given scope
    fn evaluate(&self, expression: &str, language: &str, scope: &Value) -> Result<bool, CoreError>;
}

/// Default condition evaluator using JMESPath truthiness
pub struct DefaultConditionEvaluator;

impl ConditionEvaluator for DefaultConditionEvaluator {
    fn evaluate(&self, expression: &str, language: &str, scope: &Value) -> Result<bool, CoreError> {
        match language {
            "jmespath" => expression::search_truthy(expression, scope),
            _ => Err(CoreError::ExpressionError(format!(
                "Unsupported condition language: {}",
                language
            ))),
        }
    }
}
