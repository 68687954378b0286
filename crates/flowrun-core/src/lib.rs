//!
//! Flowrun Core - step-by-step execution engine for workflow runs
//!
//! A flow is a trigger followed by a linked chain of actions. The
//! [`FlowExecutor`] walks that chain, hands each action to the executor
//! registered for its type in the [`DispatchTable`], threads the
//! [`ExecutionContext`] from one step to the next and stops when the chain
//! ends or a step moves the run out of its running verdict. Branch and loop
//! steps run their nested chains through the same executor.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - actions, contexts, verdicts and flow definitions
pub mod domain;

/// Application services - dispatch, run loop and progress reporting
pub mod application;

/// Built-in step executors
pub mod executors;

/// Error types
pub mod error;

/// Fakes for tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::CoreError;

pub use domain::action::{link_chain, Action, ActionKind, ActionType};
pub use domain::constants::{EngineConstants, DEFAULT_MAX_LOOP_ITERATIONS, DEFAULT_PROGRESS_TIMEOUT_MS};
pub use domain::context::ExecutionContext;
pub use domain::flow_definition::{ExecuteFlowOperation, ExecutionType, FlowVersion, Trigger};
pub use domain::step::{ConditionEvaluator, DefaultConditionEvaluator, StepOutput, StepStatus};
pub use domain::verdict::{ExecutionVerdict, FailedStep};

pub use application::dispatch::DispatchTable;
pub use application::flow_executor::FlowExecutor;
pub use application::http_progress::HttpProgressService;
pub use application::progress::{NoopProgressService, ProgressReporter, ProgressService, ProgressUpdate};
pub use application::step_executor::{StepExecutor, SubChainRunner};
pub use application::trigger::{NoopTriggerHook, TriggerHook};

pub use executors::{
    BranchExecutor, CodeExecutor, CodeInvocation, CodeRunner, LoopExecutor, PieceExecutor,
    PieceInvocation, PieceRunner,
};
