use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::{
    application::step_executor::{StepExecutor, SubChainRunner},
    domain::{
        action::{Action, ActionKind, ActionType},
        constants::EngineConstants,
        context::ExecutionContext,
        expression,
        step::{StepOutput, StepStatus},
        verdict::ExecutionVerdict,
    },
    executors::mismatch,
    CoreError,
};

/// Executor for loop steps
///
/// The loop step's output is `{"item", "index", "iterations"}`, where `index`
/// is 1-based and `iterations` holds, per completed pass, the outputs of the
/// body steps that ran in that pass. Body outputs are cleared before each
/// pass, so the context only ever shows the current pass's results.
#[derive(Debug, Default, Clone)]
pub struct LoopExecutor;

impl LoopExecutor {
    /// Loop executor
    pub fn new() -> Self {
        Self
    }
}

fn iteration_output(item: &Value, index: usize, iterations: &[Value]) -> Value {
    json!({
        "item": item,
        "index": index,
        "iterations": iterations,
    })
}

fn body_snapshot(body_names: &[&str], state: &ExecutionContext) -> Value {
    let mut snapshot = Map::new();
    for name in body_names {
        if let Some(output) = state.step(name).and_then(|step| step.output.clone()) {
            snapshot.insert(name.to_string(), output);
        }
    }
    Value::Object(snapshot)
}

#[async_trait]
impl StepExecutor for LoopExecutor {
    async fn handle(
        &self,
        action: &Action,
        state: ExecutionContext,
        constants: &EngineConstants,
        engine: &dyn SubChainRunner,
    ) -> Result<ExecutionContext, CoreError> {
        let ActionKind::LoopOnItems {
            settings,
            first_loop_action,
        } = &action.kind
        else {
            return Err(mismatch(action, ActionType::LoopOnItems));
        };

        let fail = |state: ExecutionContext, input: Value, message: String| {
            warn!(
                flow_run_id = %constants.flow_run_id,
                step_name = %action.name,
                error = %message,
                "Loop step failed"
            );
            state.fail_step(
                action.name.clone(),
                StepOutput::failed(ActionType::LoopOnItems, input, message),
            )
        };

        let items = match expression::resolve(&settings.items, &state.scope()) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                let message = format!("Loop items must resolve to an array, got {}", type_name(&other));
                return Ok(fail(state, json!({ "items": other }), message));
            }
            Err(err) => {
                return Ok(fail(state, json!({ "items": settings.items }), err.to_string()));
            }
        };

        let input = json!({ "items": items });
        if items.len() > constants.max_loop_iterations {
            let message = format!(
                "Loop over {} items exceeds the limit of {} iterations",
                items.len(),
                constants.max_loop_iterations
            );
            return Ok(fail(state, input, message));
        }

        let body = first_loop_action.as_deref();
        let body_names = body.map(Action::step_names).unwrap_or_default();
        let mut iterations: Vec<Value> = Vec::with_capacity(items.len());
        let mut state = state;

        for (position, item) in items.iter().enumerate() {
            let index = position + 1;
            state = state
                .clear_steps(body_names.iter().copied())
                .upsert_step(
                    action.name.clone(),
                    StepOutput::running(ActionType::LoopOnItems, input.clone())
                        .with_output(iteration_output(item, index, &iterations)),
                );

            state = engine.run_chain(body, state, constants).await?;
            iterations.push(body_snapshot(&body_names, &state));

            if !state.is_running() {
                debug!(step_name = %action.name, index, verdict = %state.verdict(), "Loop stopped early");
                let status = match state.verdict() {
                    ExecutionVerdict::Failed { .. } => StepStatus::Failed,
                    _ => StepStatus::Running,
                };
                let output = StepOutput::running(ActionType::LoopOnItems, input)
                    .with_output(iteration_output(item, index, &iterations))
                    .with_status(status);
                return Ok(state.upsert_step(action.name.clone(), output));
            }
        }

        let last = items.len();
        let output = iteration_output(items.last().unwrap_or(&Value::Null), last, &iterations);
        Ok(state.upsert_step(
            action.name.clone(),
            StepOutput::succeeded(ActionType::LoopOnItems, input, output),
        ))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
