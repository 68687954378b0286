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

/// A script ready to run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeInvocation {
    /// Name of the code step
    pub step_name: String,
    /// Script source
    pub source_code: String,
    /// Resolved inputs
    pub input: Value,
}

/// Sandbox that runs code steps
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Run the script and return its result; script errors are `Err`
    async fn run(&self, invocation: CodeInvocation, constants: &EngineConstants) -> Result<Value, CoreError>;
}

/// Executor for code steps
pub struct CodeExecutor {
    runner: Arc<dyn CodeRunner>,
}

impl CodeExecutor {
    /// Executor running scripts through `runner`
    pub fn new(runner: Arc<dyn CodeRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl StepExecutor for CodeExecutor {
    async fn handle(
        &self,
        action: &Action,
        state: ExecutionContext,
        constants: &EngineConstants,
        _engine: &dyn SubChainRunner,
    ) -> Result<ExecutionContext, CoreError> {
        let ActionKind::Code { settings } = &action.kind else {
            return Err(mismatch(action, ActionType::Code));
        };

        let input = match expression::resolve(&settings.input, &state.scope()) {
            Ok(input) => input,
            Err(err) => {
                return Ok(state.fail_step(
                    action.name.clone(),
                    StepOutput::failed(ActionType::Code, settings.input.clone(), err.to_string()),
                ))
            }
        };

        let invocation = CodeInvocation {
            step_name: action.name.clone(),
            source_code: settings.source_code.clone(),
            input: input.clone(),
        };

        match run_with_timeout(constants.step_timeout(), self.runner.run(invocation, constants)).await {
            Ok(output) => Ok(state.upsert_step(
                action.name.clone(),
                StepOutput::succeeded(ActionType::Code, input, output),
            )),
            Err(err) => {
                warn!(
                    flow_run_id = %constants.flow_run_id,
                    step_name = %action.name,
                    error = %err,
                    "Code step failed"
                );
                Ok(state.fail_step(
                    action.name.clone(),
                    StepOutput::failed(ActionType::Code, input, failure_message(&err)),
                ))
            }
        }
    }
}
