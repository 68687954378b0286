use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::{
    application::step_executor::{StepExecutor, SubChainRunner},
    domain::{
        action::{Action, ActionKind, ActionType},
        constants::EngineConstants,
        context::ExecutionContext,
        expression,
        step::StepOutput,
    },
    executors::{failure_message, mismatch, run_with_timeout},
    CoreError,
};

/// A piece action ready to run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceInvocation {
    /// Name of the piece step
    pub step_name: String,
    /// Integration package name
    pub piece_name: String,
    /// Pinned package version, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_version: Option<String>,
    /// Action to invoke inside the package
    pub action_name: String,
    /// Resolved inputs
    pub input: Value,
}

/// Runtime that invokes integration package actions
#[async_trait]
pub trait PieceRunner: Send + Sync {
    /// Invoke the action and return its result; action errors are `Err`
    async fn run(&self, invocation: PieceInvocation, constants: &EngineConstants) -> Result<Value, CoreError>;
}

/// Executor for piece steps
pub struct PieceExecutor {
    runner: Arc<dyn PieceRunner>,
}

impl PieceExecutor {
    /// Executor invoking actions through `runner`
    pub fn new(runner: Arc<dyn PieceRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl StepExecutor for PieceExecutor {
    async fn handle(
        &self,
        action: &Action,
        state: ExecutionContext,
        constants: &EngineConstants,
        _engine: &dyn SubChainRunner,
    ) -> Result<ExecutionContext, CoreError> {
        let ActionKind::Piece { settings } = &action.kind else {
            return Err(mismatch(action, ActionType::Piece));
        };

        let input = match expression::resolve(&settings.input, &state.scope()) {
            Ok(input) => input,
            Err(err) => {
                return Ok(state.fail_step(
                    action.name.clone(),
                    StepOutput::failed(ActionType::Piece, settings.input.clone(), err.to_string()),
                ))
            }
        };

        let invocation = PieceInvocation {
            step_name: action.name.clone(),
            piece_name: settings.piece_name.clone(),
            piece_version: settings.piece_version.clone(),
            action_name: settings.action_name.clone(),
            input: input.clone(),
        };

        match run_with_timeout(constants.step_timeout(), self.runner.run(invocation, constants)).await {
            Ok(output) => Ok(state.upsert_step(
                action.name.clone(),
                StepOutput::succeeded(ActionType::Piece, input, output),
            )),
            Err(err) => {
                warn!(
                    flow_run_id = %constants.flow_run_id,
                    step_name = %action.name,
                    piece_name = %settings.piece_name,
                    action_name = %settings.action_name,
                    error = %err,
                    "Piece step failed"
                );
                Ok(state.fail_step(
                    action.name.clone(),
                    StepOutput::failed(ActionType::Piece, input, failure_message(&err)),
                ))
            }
        }
    }
}
