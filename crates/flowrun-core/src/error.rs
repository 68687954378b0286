use thiserror::Error;

use crate::domain::action::ActionType;

/// Core error type for the Flowrun engine
///
/// Only configuration and infrastructure problems travel as `CoreError`.
/// Failures inside a step are folded into the execution context's verdict by
/// the step executor that owns them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No executor registered for a step type
    #[error("Not implemented: no executor registered for {0} steps")]
    ExecutorNotRegistered(ActionType),

    /// An executor received an action of a type it does not handle
    #[error("Executor mismatch: step '{step_name}' of type {actual} routed to the {expected} executor")]
    ExecutorMismatch {
        /// Name of the misrouted step
        step_name: String,
        /// Type the executor handles
        expected: ActionType,
        /// Type of the action it received
        actual: ActionType,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Flow definition validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Trigger start hook failed
    #[error("Flow trigger error: {0}")]
    FlowTriggerError(String),

    /// Progress update could not be delivered
    #[error("Progress update error: {0}")]
    ProgressError(String),

    /// Expression evaluation error
    #[error("Expression evaluation error: {0}")]
    ExpressionError(String),

    /// Step execution error raised by a code or piece runner
    #[error("Step execution error: {0}")]
    StepExecutionError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// HTTP transport error
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::TransportError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                CoreError::ExecutorNotRegistered(ActionType::Piece),
                "Not implemented: no executor registered for PIECE steps",
            ),
            (
                CoreError::ExecutorMismatch {
                    step_name: "step_1".to_string(),
                    expected: ActionType::Code,
                    actual: ActionType::Branch,
                },
                "Executor mismatch: step 'step_1' of type BRANCH routed to the CODE executor",
            ),
            (CoreError::ConfigurationError("bad".to_string()), "Configuration error: bad"),
            (CoreError::ValidationError("dup".to_string()), "Validation error: dup"),
            (CoreError::FlowTriggerError("hook".to_string()), "Flow trigger error: hook"),
            (CoreError::ProgressError("503".to_string()), "Progress update error: 503"),
            (CoreError::ExpressionError("expr".to_string()), "Expression evaluation error: expr"),
            (CoreError::StepExecutionError("boom".to_string()), "Step execution error: boom"),
            (CoreError::SerializationError("ser".to_string()), "Serialization error: ser"),
            (CoreError::TransportError("refused".to_string()), "Transport error: refused"),
            (CoreError::Other("other_err".to_string()), "other_err"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: CoreError = json_error.into();

        match error {
            CoreError::SerializationError(msg) => {
                assert!(msg.contains("expected value"));
            }
            _ => panic!("Expected SerializationError variant"),
        }
    }

    #[test]
    fn test_from_str() {
        let error: CoreError = "test error message".into();
        assert_eq!(error, CoreError::Other("test error message".to_string()));
    }
}
