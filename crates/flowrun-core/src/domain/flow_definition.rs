use crate::domain::action::Action;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Entry point of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Name of the trigger step
    pub name: String,

    /// Type of trigger (e.g. "WEBHOOK", "SCHEDULE", "PIECE_TRIGGER")
    #[serde(rename = "type", default = "default_trigger_type")]
    pub trigger_type: String,

    /// Configuration for the trigger
    #[serde(default)]
    pub settings: Value,

    /// First action of the flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<Action>>,
}

fn default_trigger_type() -> String {
    "EMPTY".to_string()
}

impl Trigger {
    /// Trigger of type `trigger_type` starting `first_action`
    pub fn new(name: impl Into<String>, trigger_type: impl Into<String>, first_action: Option<Action>) -> Self {
        Self {
            name: name.into(),
            trigger_type: trigger_type.into(),
            settings: Value::Null,
            next_action: first_action.map(Box::new),
        }
    }

    /// First action of the flow
    pub fn first_action(&self) -> Option<&Action> {
        self.next_action.as_deref()
    }
}

/// A published version of a flow, as produced by the flow builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowVersion {
    /// ID of the flow version
    #[serde(default)]
    pub id: String,

    /// Human-readable name of the flow
    #[serde(default)]
    pub display_name: String,

    /// The trigger and, through it, the action chain
    pub trigger: Trigger,
}

impl FlowVersion {
    /// Parse a flow version from JSON
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a flow version from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate the flow version
    ///
    /// Step names key outputs and timings, so they must be non-empty and
    /// unique across the whole flow, trigger and nested chains included.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.trigger.name.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Trigger must have a name".to_string(),
            ));
        }

        let mut names = HashSet::new();
        names.insert(self.trigger.name.as_str());

        if let Some(first) = self.trigger.first_action() {
            for name in first.step_names() {
                if name.trim().is_empty() {
                    return Err(CoreError::ValidationError(
                        "Step has empty or whitespace-only name".to_string(),
                    ));
                }
                if !names.insert(name) {
                    return Err(CoreError::ValidationError(format!(
                        "Duplicate step name: {}",
                        name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Whether a run starts fresh or continues a paused one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
    /// Fresh run; the trigger's start hook runs first
    Begin,
    /// Continuation of a paused run
    Resume,
}

/// Operation descriptor that starts a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteFlowOperation {
    /// Flow to run
    pub flow_version: FlowVersion,

    /// Begin or resume
    pub execution_type: ExecutionType,

    /// Payload the trigger fired with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_payload: Option<Value>,
}

impl ExecuteFlowOperation {
    /// Fresh run of `flow_version`
    pub fn begin(flow_version: FlowVersion, trigger_payload: Option<Value>) -> Self {
        Self {
            flow_version,
            execution_type: ExecutionType::Begin,
            trigger_payload,
        }
    }

    /// Resumed run of `flow_version`
    pub fn resume(flow_version: FlowVersion) -> Self {
        Self {
            flow_version,
            execution_type: ExecutionType::Resume,
            trigger_payload: None,
        }
    }
}
