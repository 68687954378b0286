use flowrun_core::{
    application::progress::ProgressService,
    link_chain,
    testing::{
        EventLog, FailingProgressService, RecordingProgressService, ScriptedExecutor,
        StalledProgressService,
    },
    Action, ActionType, CoreError, DispatchTable, EngineConstants, ExecutionContext,
    ExecuteFlowOperation, ExecutionVerdict, FlowExecutor, FlowVersion, LoopExecutor, Trigger,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn code(name: &str) -> Action {
    Action::code(name, "", json!({}))
}

fn code_only(executor: ScriptedExecutor) -> DispatchTable {
    DispatchTable::new().with_executor(ActionType::Code, Arc::new(executor))
}

#[tokio::test(start_paused = true)]
async fn test_each_step_runs_once_and_is_timed() {
    let log = EventLog::new();
    let executor = ScriptedExecutor::new(ActionType::Code, log.clone())
        .with_delay("a", Duration::from_millis(10))
        .with_delay("b", Duration::from_millis(20))
        .with_delay("c", Duration::from_millis(30));
    let engine = FlowExecutor::new(code_only(executor));
    let chain = link_chain(vec![code("a"), code("b"), code("c")]);

    let state = engine
        .execute(chain.as_ref(), ExecutionContext::new(), &EngineConstants::default())
        .await
        .unwrap();

    assert_eq!(log.entries().await, vec!["handle:a", "handle:b", "handle:c"]);
    assert_eq!(state.step_duration("a"), Some(Duration::from_millis(10)));
    assert_eq!(state.step_duration("b"), Some(Duration::from_millis(20)));
    assert_eq!(state.step_duration("c"), Some(Duration::from_millis(30)));
    assert_eq!(state.duration(), Some(Duration::from_millis(60)));
    assert_eq!(state.verdict(), &ExecutionVerdict::Running);
}

#[tokio::test]
async fn test_each_step_sees_previous_output() {
    let log = EventLog::new();
    let executor = Arc::new(ScriptedExecutor::new(ActionType::Code, log.clone()));
    let engine = FlowExecutor::new(DispatchTable::new().with_executor(ActionType::Code, executor.clone()));
    let chain = link_chain(vec![code("a"), code("b")]);

    engine
        .execute(chain.as_ref(), ExecutionContext::new(), &EngineConstants::default())
        .await
        .unwrap();

    let returned = executor.returned_contexts().await;
    assert_eq!(returned.len(), 2);
    // The context handed to b already carried a's output and timing
    assert_eq!(returned[1].step("a"), returned[0].step("a"));
    assert!(returned[1].step_duration("a").is_some());
}

#[tokio::test]
async fn test_terminal_step_stops_the_run() {
    let log = EventLog::new();
    let executor = Arc::new(
        ScriptedExecutor::new(ActionType::Code, log.clone())
            .with_verdict("b", ExecutionVerdict::Succeeded),
    );
    let engine = FlowExecutor::new(DispatchTable::new().with_executor(ActionType::Code, executor.clone()));
    let chain = link_chain(vec![code("a"), code("b"), code("c"), code("d")]);

    let state = engine
        .execute(chain.as_ref(), ExecutionContext::new(), &EngineConstants::default())
        .await
        .unwrap();

    assert_eq!(log.entries().await, vec!["handle:a", "handle:b"]);

    // Result is b's context plus b's timing and the total duration
    let returned = executor.returned_contexts().await;
    let expected = returned[1]
        .clone()
        .set_step_duration("b", state.step_duration("b").unwrap())
        .set_duration(state.duration().unwrap());
    assert_eq!(state, expected);
    assert_eq!(state.step_durations().len(), 2);
}

#[tokio::test]
async fn test_paused_and_unknown_verdicts_are_terminal() {
    for verdict in [
        ExecutionVerdict::Paused { reason: Some("waiting for approval".to_string()) },
        ExecutionVerdict::Other { label: "QUOTA_EXCEEDED".to_string() },
    ] {
        let log = EventLog::new();
        let executor = ScriptedExecutor::new(ActionType::Code, log.clone()).with_verdict("a", verdict.clone());
        let engine = FlowExecutor::new(code_only(executor));
        let chain = link_chain(vec![code("a"), code("b")]);

        let state = engine
            .execute(chain.as_ref(), ExecutionContext::new(), &EngineConstants::default())
            .await
            .unwrap();

        assert_eq!(log.entries().await, vec!["handle:a"]);
        assert_eq!(state.verdict(), &verdict);
    }
}

#[tokio::test(start_paused = true)]
async fn test_repeated_step_name_keeps_latest_duration() {
    let log = EventLog::new();
    let body = ScriptedExecutor::new(ActionType::Code, log.clone()).with_delay_sequence(
        "charge",
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
        ],
    );
    let dispatch = code_only(body).with_executor(ActionType::LoopOnItems, Arc::new(LoopExecutor::new()));
    let engine = FlowExecutor::new(dispatch);
    let chain = Action::loop_on_items("each", json!([1, 2, 3]), Some(code("charge")));

    let state = engine
        .execute(Some(&chain), ExecutionContext::new(), &EngineConstants::default())
        .await
        .unwrap();

    assert_eq!(log.entries().await.len(), 3);
    assert_eq!(state.step_duration("charge"), Some(Duration::from_millis(30)));
    assert_eq!(state.step_duration("each"), Some(Duration::from_millis(60)));
    assert_eq!(state.step("charge").unwrap().output, Some(json!({ "step": "charge", "invocation": 3 })));
}

#[tokio::test]
async fn test_unregistered_type_fails_before_handler_and_report() {
    let log = EventLog::new();
    let progress = Arc::new(RecordingProgressService::with_log(log.clone()));
    let executor = ScriptedExecutor::new(ActionType::Code, log.clone());
    let engine = FlowExecutor::new(code_only(executor)).with_progress_service(progress.clone());
    let chain = link_chain(vec![
        code("a"),
        Action::branch("b", "trigger.ok", None, None),
        code("c"),
    ]);

    let err = engine
        .execute(chain.as_ref(), ExecutionContext::new(), &EngineConstants::default())
        .await
        .unwrap_err();

    assert_eq!(err, CoreError::ExecutorNotRegistered(ActionType::Branch));

    // Let detached progress tasks settle
    tokio::time::sleep(Duration::from_millis(50)).await;

    let updates = progress.updates().await;
    assert_eq!(updates.len(), 1);
    assert!(updates[0].context.steps().is_empty());

    let entries = log.entries().await;
    assert!(entries.contains(&"handle:a".to_string()));
    assert!(!entries.contains(&"handle:b".to_string()));
    assert!(!entries.contains(&"handle:c".to_string()));
}

#[tokio::test]
async fn test_reports_precede_each_step_with_previous_timing() {
    let log = EventLog::new();
    let progress = Arc::new(RecordingProgressService::new());
    let engine = FlowExecutor::new(code_only(ScriptedExecutor::new(ActionType::Code, log)))
        .with_progress_service(progress.clone());
    let chain = link_chain(vec![code("a"), code("b"), code("c")]);

    let state = engine
        .execute(chain.as_ref(), ExecutionContext::new(), &EngineConstants::default())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut updates = progress.updates().await;
    updates.sort_by_key(|update| update.context.steps().len());
    assert_eq!(updates.len(), 3);
    assert_eq!(updates[0].last_step_duration, None);
    assert_eq!(updates[1].last_step_duration, state.step_duration("a"));
    assert_eq!(updates[2].last_step_duration, state.step_duration("b"));
}

async fn run_with(service: Arc<dyn ProgressService>) -> ExecutionContext {
    let executor = ScriptedExecutor::new(ActionType::Code, EventLog::new())
        .with_delay("a", Duration::from_millis(5))
        .with_verdict("c", ExecutionVerdict::failed("c", "boom"));
    let engine = FlowExecutor::new(code_only(executor)).with_progress_service(service);
    let chain = link_chain(vec![code("a"), code("b"), code("c"), code("d")]);
    let state = ExecutionContext::new().with_trigger_payload(json!({ "order": 7 }));

    engine
        .execute(chain.as_ref(), state, &EngineConstants::for_flow("flow-1"))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_failing_progress_does_not_change_the_result() {
    let failing = Arc::new(FailingProgressService::new());

    let with_noop = run_with(Arc::new(flowrun_core::NoopProgressService)).await;
    let with_failing = run_with(failing.clone()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(with_failing, with_noop);
    assert_eq!(failing.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_progress_never_blocks_the_run() {
    let stalled = Arc::new(StalledProgressService::new());

    let with_noop = run_with(Arc::new(flowrun_core::NoopProgressService)).await;
    let with_stalled = tokio::time::timeout(Duration::from_secs(1), run_with(stalled.clone()))
        .await
        .expect("run waited on progress delivery");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(with_stalled, with_noop);
    // Every update was handed over and none of them ever finished
    assert_eq!(stalled.received(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_progress_never_blocks_a_triggered_run() {
    let log = EventLog::new();
    let stalled = Arc::new(StalledProgressService::new());
    let engine = FlowExecutor::new(code_only(ScriptedExecutor::new(ActionType::Code, log.clone())))
        .with_progress_service(stalled.clone());
    let flow = FlowVersion {
        id: "fv-1".to_string(),
        display_name: "Stalled progress".to_string(),
        trigger: Trigger::new("trigger", "WEBHOOK", link_chain(vec![code("a"), code("b")])),
    };

    let state = tokio::time::timeout(
        Duration::from_secs(1),
        engine.execute_from_trigger(
            ExecutionContext::new(),
            &EngineConstants::default(),
            &ExecuteFlowOperation::begin(flow, None),
        ),
    )
    .await
    .expect("run waited on progress delivery")
    .unwrap();

    assert!(state.is_running());
    assert_eq!(log.entries().await, vec!["handle:a", "handle:b"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_branch_stops_before_piece() {
    let log = EventLog::new();
    let dispatch = ActionType::ALL.into_iter().fold(DispatchTable::new(), |table, t| {
        let executor = ScriptedExecutor::new(t, log.clone())
            .with_delay("a", Duration::from_millis(15))
            .with_delay("b", Duration::from_millis(25))
            .with_verdict("b", ExecutionVerdict::failed("b", "condition could not be evaluated"));
        table.with_executor(t, Arc::new(executor))
    });
    let engine = FlowExecutor::new(dispatch);
    let chain = link_chain(vec![
        code("a"),
        Action::branch("b", "a.ready", None, None),
        Action::piece("c", "@flowrun/piece-http", "send_request", json!({})),
    ]);

    let state = engine
        .execute(chain.as_ref(), ExecutionContext::new(), &EngineConstants::default())
        .await
        .unwrap();

    assert_eq!(log.entries().await, vec!["handle:a", "handle:b"]);
    assert!(matches!(state.verdict(), ExecutionVerdict::Failed { .. }));

    let mut timed: Vec<&String> = state.step_durations().keys().collect();
    timed.sort();
    assert_eq!(timed, vec!["a", "b"]);

    let measured = state.step_duration("a").unwrap() + state.step_duration("b").unwrap();
    assert!(state.duration().unwrap() >= measured);
}
