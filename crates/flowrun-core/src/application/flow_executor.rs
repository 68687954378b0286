use async_trait::async_trait;
use flowrun_monitoring::{LogExt, RunMetrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::{
    application::{
        dispatch::DispatchTable,
        progress::{ProgressReporter, ProgressService},
        step_executor::{StepExecutor, SubChainRunner},
        trigger::{NoopTriggerHook, TriggerHook},
    },
    domain::{
        action::{Action, ActionType},
        constants::EngineConstants,
        context::ExecutionContext,
        flow_definition::{ExecuteFlowOperation, ExecutionType},
    },
    CoreError,
};

/// Runs action chains step by step
///
/// Steps run strictly in chain order, each one receiving the context the
/// previous one returned. The loop stops at the end of the chain or as soon
/// as a step leaves the context in a non-running verdict.
#[derive(Clone)]
pub struct FlowExecutor {
    dispatch: DispatchTable,
    progress: ProgressReporter,
    trigger_hook: Arc<dyn TriggerHook>,
}

impl FlowExecutor {
    /// Executor dispatching through `dispatch`, with no progress delivery
    /// and no trigger start hook
    pub fn new(dispatch: DispatchTable) -> Self {
        Self {
            dispatch,
            progress: ProgressReporter::noop(),
            trigger_hook: Arc::new(NoopTriggerHook),
        }
    }

    /// Deliver progress updates to `service`
    pub fn with_progress_service(mut self, service: Arc<dyn ProgressService>) -> Self {
        self.progress = ProgressReporter::new(service);
        self
    }

    /// Run `hook` before the first action of fresh runs
    pub fn with_trigger_hook(mut self, hook: Arc<dyn TriggerHook>) -> Self {
        self.trigger_hook = hook;
        self
    }

    /// The dispatch table
    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Executor for a step type
    pub fn executor_for(&self, action_type: ActionType) -> Result<&Arc<dyn StepExecutor>, CoreError> {
        self.dispatch.resolve(action_type)
    }

    /// Start or resume a run of `operation`'s flow
    ///
    /// On a fresh run the trigger's start hook runs first and its failure
    /// aborts the run. Two start updates are then spawned, both before the
    /// chain is first polled; neither is awaited.
    pub async fn execute_from_trigger(
        &self,
        state: ExecutionContext,
        constants: &EngineConstants,
        operation: &ExecuteFlowOperation,
    ) -> Result<ExecutionContext, CoreError> {
        let trigger = &operation.flow_version.trigger;

        info!(
            flow_id = %constants.flow_id,
            flow_run_id = %constants.flow_run_id,
            execution_type = ?operation.execution_type,
            "Starting flow run"
        );

        if operation.execution_type == ExecutionType::Begin {
            self.trigger_hook
                .execute_on_start(trigger, constants, operation.trigger_payload.as_ref())
                .await
                .log_err("Trigger start hook failed")?;
        }

        self.progress.report(constants, &state, None);
        let run = self.execute(trigger.first_action(), state.clone(), constants);
        self.progress.report(constants, &state, None);

        let state = run.await?;

        info!(
            flow_run_id = %constants.flow_run_id,
            verdict = %state.verdict(),
            "Flow run finished"
        );

        Ok(state)
    }

    /// Execute the chain starting at `action`
    ///
    /// Returns the final context with every executed step's duration and the
    /// total duration stamped. An unregistered step type or an executor
    /// error aborts the run.
    #[instrument(name = "flow_execute", skip_all, fields(flow_run_id = %constants.flow_run_id))]
    pub async fn execute(
        &self,
        action: Option<&Action>,
        state: ExecutionContext,
        constants: &EngineConstants,
    ) -> Result<ExecutionContext, CoreError> {
        let flow_start = Instant::now();
        let mut state = state;
        let mut current = action;
        let mut last_step_duration: Option<Duration> = None;
        let mut executed = 0usize;

        while let Some(step) = current {
            let step_type = step.action_type();
            let handler = self
                .dispatch
                .resolve(step_type)
                .log_err("Cannot dispatch step")?;

            self.progress.report(constants, &state, last_step_duration);

            debug!(
                step_name = %step.name,
                step_type = %step_type,
                "Executing step"
            );

            let step_start = Instant::now();
            state = handler.handle(step, state, constants, self).await?;
            let step_duration = step_start.elapsed();

            last_step_duration = Some(step_duration);
            executed += 1;
            state = state.set_step_duration(step.name.clone(), step_duration);

            RunMetrics::record_step_execution(
                &constants.flow_run_id,
                &step.name,
                step_duration,
                state.is_running(),
            );

            if !state.is_running() {
                debug!(
                    step_name = %step.name,
                    verdict = %state.verdict(),
                    "Step halted the run"
                );
                break;
            }

            current = step.next();
        }

        let duration = flow_start.elapsed();
        RunMetrics::record_flow_execution(
            &constants.flow_run_id,
            duration,
            executed,
            state.verdict().label(),
        );

        Ok(state.set_duration(duration))
    }
}

#[async_trait]
impl SubChainRunner for FlowExecutor {
    async fn run_chain(
        &self,
        action: Option<&Action>,
        state: ExecutionContext,
        constants: &EngineConstants,
    ) -> Result<ExecutionContext, CoreError> {
        self.execute(action, state, constants).await
    }
}
