//! The uniform step contract and the sub-chain capability handed to it.

use async_trait::async_trait;

use crate::{
    domain::{action::Action, constants::EngineConstants, context::ExecutionContext},
    CoreError,
};

/// Runs a chain of actions within the current run
///
/// Passed to every [`StepExecutor::handle`] call so that branch and loop
/// steps can execute their nested chains without depending on the
/// orchestrator type.
#[async_trait]
pub trait SubChainRunner: Send + Sync {
    /// Execute the chain starting at `action` and return the resulting context
    async fn run_chain(
        &self,
        action: Option<&Action>,
        state: ExecutionContext,
        constants: &EngineConstants,
    ) -> Result<ExecutionContext, CoreError>;
}

/// Handler for one step type
///
/// Implementations return the next context. A failure inside the step is
/// reported through the returned context's verdict; `Err` is reserved for
/// configuration problems that must abort the run.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute `action` against `state`
    async fn handle(
        &self,
        action: &Action,
        state: ExecutionContext,
        constants: &EngineConstants,
        engine: &dyn SubChainRunner,
    ) -> Result<ExecutionContext, CoreError>;
}
