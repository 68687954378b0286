use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a run as seen by the orchestrator
///
/// Only [`ExecutionVerdict::Running`] lets the run loop continue. The other
/// variants are terminal from the engine's point of view; the wider system
/// may add labels the engine does not know about, carried as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ExecutionVerdict {
    /// The run may continue with the next step
    #[default]
    Running,

    /// The run finished and its outcome is final
    Succeeded,

    /// A step asked to suspend the run
    Paused {
        /// Why the run was paused
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// A step failed and the run must stop
    Failed {
        /// The step that failed, when known
        #[serde(
            rename = "failedStep",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        failed_step: Option<FailedStep>,
    },

    /// Terminal status defined outside the engine
    Other {
        /// Label as reported by whoever set it
        label: String,
    },
}

/// Diagnostic attached to a failed verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedStep {
    /// Name of the failing step
    pub name: String,
    /// Error message reported by the step
    pub message: String,
}

impl ExecutionVerdict {
    /// Failed verdict pointing at `step_name`
    pub fn failed(step_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExecutionVerdict::Failed {
            failed_step: Some(FailedStep {
                name: step_name.into(),
                message: message.into(),
            }),
        }
    }

    /// Whether the run loop may continue
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionVerdict::Running)
    }

    /// Whether the run loop must stop
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    /// Wire label of the verdict
    pub fn label(&self) -> &str {
        match self {
            ExecutionVerdict::Running => "RUNNING",
            ExecutionVerdict::Succeeded => "SUCCEEDED",
            ExecutionVerdict::Paused { .. } => "PAUSED",
            ExecutionVerdict::Failed { .. } => "FAILED",
            ExecutionVerdict::Other { label } => label,
        }
    }
}

impl fmt::Display for ExecutionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
