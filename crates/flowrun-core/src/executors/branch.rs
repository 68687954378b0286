use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    application::step_executor::{StepExecutor, SubChainRunner},
    domain::{
        action::{Action, ActionKind, ActionType},
        constants::EngineConstants,
        context::ExecutionContext,
        step::{ConditionEvaluator, StepOutput},
    },
    executors::mismatch,
    CoreError,
};

/// Executor for branch steps
///
/// Records `{"conditionResult": bool}` and then runs the matching arm to
/// completion before returning.
pub struct BranchExecutor {
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl BranchExecutor {
    /// Executor evaluating conditions with `evaluator`
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl StepExecutor for BranchExecutor {
    async fn handle(
        &self,
        action: &Action,
        state: ExecutionContext,
        constants: &EngineConstants,
        engine: &dyn SubChainRunner,
    ) -> Result<ExecutionContext, CoreError> {
        let ActionKind::Branch {
            settings,
            on_success_action,
            on_failure_action,
        } = &action.kind
        else {
            return Err(mismatch(action, ActionType::Branch));
        };

        let condition = &settings.condition;
        let input = json!({ "condition": condition.expression });

        let result = match self
            .evaluator
            .evaluate(&condition.expression, &condition.language, &state.scope())
        {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    flow_run_id = %constants.flow_run_id,
                    step_name = %action.name,
                    error = %err,
                    "Branch condition failed"
                );
                return Ok(state.fail_step(
                    action.name.clone(),
                    StepOutput::failed(ActionType::Branch, input, err.to_string()),
                ));
            }
        };

        debug!(step_name = %action.name, condition_result = result, "Branch condition evaluated");

        let state = state.upsert_step(
            action.name.clone(),
            StepOutput::succeeded(ActionType::Branch, input, json!({ "conditionResult": result })),
        );

        let arm = if result { on_success_action } else { on_failure_action };
        match arm.as_deref() {
            Some(first) => engine.run_chain(Some(first), state, constants).await,
            None => Ok(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{dispatch::DispatchTable, flow_executor::FlowExecutor};
    use crate::domain::{step::DefaultConditionEvaluator, verdict::ExecutionVerdict};
    use crate::testing::{EventLog, ScriptedExecutor};

    fn branch_executor() -> BranchExecutor {
        BranchExecutor::new(Arc::new(DefaultConditionEvaluator))
    }

    fn engine(log: &EventLog) -> FlowExecutor {
        FlowExecutor::new(
            DispatchTable::new().with_executor(ActionType::Code, Arc::new(ScriptedExecutor::new(ActionType::Code, log.clone()))),
        )
    }

    fn arms() -> Action {
        Action::branch(
            "check",
            "trigger.amount > `100`",
            Some(Action::code("approve", "", json!({}))),
            Some(Action::code("reject", "", json!({})).with_next(Action::code("notify", "", json!({})))),
        )
    }

    #[tokio::test]
    async fn test_true_condition_runs_success_arm() {
        let log = EventLog::new();
        let state = ExecutionContext::new().with_trigger_payload(json!({ "amount": 250 }));

        let state = branch_executor()
            .handle(&arms(), state, &EngineConstants::default(), &engine(&log))
            .await
            .unwrap();

        assert_eq!(log.entries().await, vec!["handle:approve"]);
        assert_eq!(state.step("check").unwrap().output, Some(json!({ "conditionResult": true })));
        assert!(state.step("reject").is_none());
    }

    #[tokio::test]
    async fn test_false_condition_runs_failure_arm_to_completion() {
        let log = EventLog::new();
        let state = ExecutionContext::new().with_trigger_payload(json!({ "amount": 5 }));

        let state = branch_executor()
            .handle(&arms(), state, &EngineConstants::default(), &engine(&log))
            .await
            .unwrap();

        assert_eq!(log.entries().await, vec!["handle:reject", "handle:notify"]);
        assert_eq!(state.step("check").unwrap().output, Some(json!({ "conditionResult": false })));
    }

    #[tokio::test]
    async fn test_missing_arm_leaves_context_running() {
        let log = EventLog::new();
        let action = Action::branch("check", "trigger.flag", None, None);
        let state = ExecutionContext::new().with_trigger_payload(json!({ "flag": true }));

        let state = branch_executor()
            .handle(&action, state, &EngineConstants::default(), &engine(&log))
            .await
            .unwrap();

        assert!(state.is_running());
        assert!(log.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_condition_fails_step() {
        let log = EventLog::new();
        let action = Action::branch("check", "[[", None, None);

        let state = branch_executor()
            .handle(&action, ExecutionContext::new(), &EngineConstants::default(), &engine(&log))
            .await
            .unwrap();

        assert!(matches!(state.verdict(), ExecutionVerdict::Failed { .. }));
        assert_eq!(state.step("check").unwrap().input, json!({ "condition": "[[" }));
    }
}
