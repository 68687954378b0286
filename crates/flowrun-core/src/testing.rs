//! Fakes for exercising the engine without real runners or services.
//!
//! Available in unit tests and, through the `testing` feature, to
//! integration tests and downstream crates.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{
    application::{
        progress::{ProgressService, ProgressUpdate},
        step_executor::{StepExecutor, SubChainRunner},
        trigger::TriggerHook,
    },
    domain::{
        action::{Action, ActionType},
        constants::EngineConstants,
        context::ExecutionContext,
        flow_definition::Trigger,
        step::StepOutput,
        verdict::ExecutionVerdict,
    },
    executors::{CodeInvocation, CodeRunner, PieceInvocation, PieceRunner},
    CoreError,
};

/// Shared, ordered record of events across fakes
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub async fn push(&self, entry: impl Into<String>) {
        self.entries.lock().await.push(entry.into());
    }

    /// Copy of every entry so far
    pub async fn entries(&self) -> Vec<String> {
        self.entries.lock().await.clone()
    }
}

/// Step executor that records calls and follows a script
///
/// Each handled step logs `handle:<name>` and records a succeeded output
/// `{"step": <name>, "invocation": <n>}` where `n` counts calls for that
/// name. Verdicts and delays can be scripted per step name.
pub struct ScriptedExecutor {
    action_type: ActionType,
    log: EventLog,
    verdicts: HashMap<String, ExecutionVerdict>,
    repeating_delays: HashMap<String, Duration>,
    delays: Mutex<HashMap<String, VecDeque<Duration>>>,
    invocations: Mutex<HashMap<String, usize>>,
    returned: Mutex<Vec<ExecutionContext>>,
}

impl ScriptedExecutor {
    /// Executor for `action_type` logging into `log`
    pub fn new(action_type: ActionType, log: EventLog) -> Self {
        Self {
            action_type,
            log,
            verdicts: HashMap::new(),
            repeating_delays: HashMap::new(),
            delays: Mutex::new(HashMap::new()),
            invocations: Mutex::new(HashMap::new()),
            returned: Mutex::new(Vec::new()),
        }
    }

    /// Leave the context in `verdict` after handling `step_name`
    pub fn with_verdict(mut self, step_name: impl Into<String>, verdict: ExecutionVerdict) -> Self {
        self.verdicts.insert(step_name.into(), verdict);
        self
    }

    /// Sleep before returning from `step_name`, one delay per call
    ///
    /// Once the sequence is used up the repeating delay, if any, applies.
    pub fn with_delay_sequence(mut self, step_name: impl Into<String>, delays: Vec<Duration>) -> Self {
        self.delays.get_mut().insert(step_name.into(), delays.into());
        self
    }

    /// Sleep for `delay` every time `step_name` is handled
    pub fn with_delay(mut self, step_name: impl Into<String>, delay: Duration) -> Self {
        self.repeating_delays.insert(step_name.into(), delay);
        self
    }

    /// Every context this executor returned, in order
    pub async fn returned_contexts(&self) -> Vec<ExecutionContext> {
        self.returned.lock().await.clone()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn handle(
        &self,
        action: &Action,
        state: ExecutionContext,
        _constants: &EngineConstants,
        _engine: &dyn SubChainRunner,
    ) -> Result<ExecutionContext, CoreError> {
        if action.action_type() != self.action_type {
            return Err(CoreError::ExecutorMismatch {
                step_name: action.name.clone(),
                expected: self.action_type,
                actual: action.action_type(),
            });
        }

        self.log.push(format!("handle:{}", action.name)).await;

        let delay = self
            .delays
            .lock()
            .await
            .get_mut(&action.name)
            .and_then(|queue| queue.pop_front())
            .or_else(|| self.repeating_delays.get(&action.name).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let invocation = {
            let mut counts = self.invocations.lock().await;
            let count = counts.entry(action.name.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let mut state = state.upsert_step(
            action.name.clone(),
            StepOutput::succeeded(
                self.action_type,
                json!({}),
                json!({ "step": action.name, "invocation": invocation }),
            ),
        );
        if let Some(verdict) = self.verdicts.get(&action.name) {
            state = state.set_verdict(verdict.clone());
        }

        self.returned.lock().await.push(state.clone());
        Ok(state)
    }
}

enum Scripted {
    Output(Value),
    Error(String),
    Delay(Duration),
}

/// Code and piece runner answering from a script keyed by step name
///
/// Unscripted steps echo their resolved input.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: HashMap<String, Scripted>,
    invocations: Mutex<Vec<(String, Value)>>,
}

impl ScriptedRunner {
    /// Runner echoing every input
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `output` for `step_name`
    pub fn with_output(mut self, step_name: impl Into<String>, output: Value) -> Self {
        self.responses.insert(step_name.into(), Scripted::Output(output));
        self
    }

    /// Fail `step_name` with `message`
    pub fn with_error(mut self, step_name: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses
            .insert(step_name.into(), Scripted::Error(message.into()));
        self
    }

    /// Sleep for `delay` before echoing the input of `step_name`
    pub fn with_delay(mut self, step_name: impl Into<String>, delay: Duration) -> Self {
        self.responses.insert(step_name.into(), Scripted::Delay(delay));
        self
    }

    /// `(step name, resolved input)` of every call, in order
    pub async fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().await.clone()
    }

    async fn respond(&self, step_name: &str, input: Value) -> Result<Value, CoreError> {
        self.invocations
            .lock()
            .await
            .push((step_name.to_string(), input.clone()));

        match self.responses.get(step_name) {
            Some(Scripted::Output(output)) => Ok(output.clone()),
            Some(Scripted::Error(message)) => Err(CoreError::StepExecutionError(message.clone())),
            Some(Scripted::Delay(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(input)
            }
            None => Ok(input),
        }
    }
}

#[async_trait]
impl CodeRunner for ScriptedRunner {
    async fn run(&self, invocation: CodeInvocation, _constants: &EngineConstants) -> Result<Value, CoreError> {
        self.respond(&invocation.step_name, invocation.input).await
    }
}

#[async_trait]
impl PieceRunner for ScriptedRunner {
    async fn run(&self, invocation: PieceInvocation, _constants: &EngineConstants) -> Result<Value, CoreError> {
        self.respond(&invocation.step_name, invocation.input).await
    }
}

/// Progress service keeping every update it receives
#[derive(Default)]
pub struct RecordingProgressService {
    updates: Mutex<Vec<ProgressUpdate>>,
    log: Option<EventLog>,
}

impl RecordingProgressService {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log `progress:<recorded steps>` for each update
    pub fn with_log(log: EventLog) -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
            log: Some(log),
        }
    }

    /// Updates received so far
    pub async fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().await.clone()
    }
}

#[async_trait]
impl ProgressService for RecordingProgressService {
    async fn send_update(&self, update: ProgressUpdate) -> Result<(), CoreError> {
        if let Some(log) = &self.log {
            log.push(format!("progress:{}", update.context.steps().len())).await;
        }
        self.updates.lock().await.push(update);
        Ok(())
    }
}

/// Progress service whose every delivery fails
#[derive(Debug, Default)]
pub struct FailingProgressService {
    attempts: AtomicUsize,
}

impl FailingProgressService {
    /// Failing service
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delivery attempts
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressService for FailingProgressService {
    async fn send_update(&self, _update: ProgressUpdate) -> Result<(), CoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(CoreError::ProgressError("connection refused".to_string()))
    }
}

/// Progress service whose deliveries never complete
///
/// Each update is counted on arrival and then parked forever, like an
/// endpoint that accepts the connection and never answers.
#[derive(Debug, Default)]
pub struct StalledProgressService {
    received: AtomicUsize,
}

impl StalledProgressService {
    /// Stalled service
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of updates that started delivery
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressService for StalledProgressService {
    async fn send_update(&self, _update: ProgressUpdate) -> Result<(), CoreError> {
        self.received.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Trigger hook that logs `trigger:start` and optionally fails
#[derive(Debug, Default)]
pub struct RecordingTriggerHook {
    log: EventLog,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl RecordingTriggerHook {
    /// Hook logging into `log`
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Hook logging into `log` and then failing with `message`
    pub fn failing(log: EventLog, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(log)
        }
    }

    /// Number of calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TriggerHook for RecordingTriggerHook {
    async fn execute_on_start(
        &self,
        _trigger: &Trigger,
        _constants: &EngineConstants,
        _payload: Option<&Value>,
    ) -> Result<(), CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.push("trigger:start").await;
        match &self.failure {
            Some(message) => Err(CoreError::FlowTriggerError(message.clone())),
            None => Ok(()),
        }
    }
}
