//! Built-in step executors, one per step type.
//!
//! Code and piece steps delegate the actual work to injected runners; branch
//! and loop steps run their nested chains through the [`SubChainRunner`]
//! they are handed.
//!
//! [`SubChainRunner`]: crate::application::step_executor::SubChainRunner

use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::{
    domain::action::{Action, ActionType},
    CoreError,
};

mod branch;
mod code;
mod loop_on_items;
mod piece;

pub use branch::BranchExecutor;
pub use code::{CodeExecutor, CodeInvocation, CodeRunner};
pub use loop_on_items::LoopExecutor;
pub use piece::{PieceExecutor, PieceInvocation, PieceRunner};

/// Await `future`, failing with a step error once `timeout` elapses
pub(crate) async fn run_with_timeout<F>(timeout: Option<Duration>, future: F) -> Result<Value, CoreError>
where
    F: Future<Output = Result<Value, CoreError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future).await.unwrap_or_else(|_| {
            Err(CoreError::StepExecutionError(format!(
                "Step timed out after {:?}",
                limit
            )))
        }),
        None => future.await,
    }
}

/// Message stored in a failed step output
pub(crate) fn failure_message(error: &CoreError) -> String {
    match error {
        CoreError::StepExecutionError(message) => message.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn mismatch(action: &Action, expected: ActionType) -> CoreError {
    CoreError::ExecutorMismatch {
        step_name: action.name.clone(),
        expected,
        actual: action.action_type(),
    }
}
