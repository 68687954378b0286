/// Action chains and their settings
pub mod action;

/// Engine constants
pub mod constants;

/// Execution context
pub mod context;

/// Input templates and JMESPath evaluation
pub mod expression;

/// Flow versions, triggers and run operations
pub mod flow_definition;

/// Step outputs and condition evaluation
pub mod step;

/// Run verdicts
pub mod verdict;
