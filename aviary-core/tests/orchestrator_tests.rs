mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{FailingTool, RecordingSink, SleepTool, StaticTool};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use aviary_core::{
    Emitter, EventSink, ExecutionStats, OrchestratorError, RetrievalOrchestrator, RetrievalPlan,
    ToolCapability,
};

fn memo_and_schedule_plan() -> RetrievalPlan {
    RetrievalPlan {
        needs_memo_search: true,
        memo_search_query: "standup".to_string(),
        needs_schedule_query: true,
        schedule_range: "today".to_string(),
        ..RetrievalPlan::default()
    }
}

fn emitter(sink: &RecordingSink) -> Emitter {
    Emitter::new(Some(Arc::new(sink.clone()) as Arc<dyn EventSink>))
}

#[tokio::test]
async fn test_all_requested_tools_succeed() {
    common::init_tracing();
    let plan = memo_and_schedule_plan();
    let tools: Vec<Arc<dyn ToolCapability>> = vec![
        Arc::new(StaticTool::new("memo_search", "three notes")),
        Arc::new(StaticTool::new("schedule_query", "two meetings")),
    ];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let mut stats = ExecutionStats::new("planning");

    let results = tokio_test::assert_ok!(
        RetrievalOrchestrator::default()
            .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
            .await
    );

    assert_eq!(results.len(), 2);
    assert_eq!(results["memo_search"], "three notes");
    assert_eq!(results["schedule_query"], "two meetings");
    assert_eq!(stats.tool_calls, 2);
    assert_eq!(sink.count("tool_use"), 2);
    assert_eq!(sink.count("tool_result"), 2);
}

#[tokio::test]
async fn test_partial_failure_returns_map_without_error() {
    let plan = memo_and_schedule_plan();
    let tools: Vec<Arc<dyn ToolCapability>> = vec![
        Arc::new(FailingTool::new("memo_search")),
        Arc::new(StaticTool::new("schedule_query", "two meetings")),
    ];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let mut stats = ExecutionStats::new("planning");

    let results = RetrievalOrchestrator::default()
        .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
        .await
        .unwrap();

    // The failed tool appears as an error entry; the rest is intact.
    assert_eq!(results["memo_search_error"], "tool backend unavailable");
    assert_eq!(results["schedule_query"], "two meetings");
    assert_eq!(stats.tool_calls, 1);
}

#[tokio::test]
async fn test_all_launched_failing_is_a_hard_error() {
    let plan = memo_and_schedule_plan();
    let tools: Vec<Arc<dyn ToolCapability>> = vec![
        Arc::new(FailingTool::new("memo_search")),
        Arc::new(FailingTool::new("schedule_query")),
    ];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let mut stats = ExecutionStats::new("planning");

    let err = RetrievalOrchestrator::default()
        .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::AllToolsFailed { launched: 2 }
    ));
}

#[tokio::test]
async fn test_missing_tool_counts_as_failure() {
    let plan = RetrievalPlan {
        needs_free_time: true,
        free_time_date: "tomorrow".to_string(),
        ..RetrievalPlan::default()
    };
    let tools: Vec<Arc<dyn ToolCapability>> = vec![];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let mut stats = ExecutionStats::new("planning");

    let err = RetrievalOrchestrator::default()
        .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::AllToolsFailed { launched: 1 }
    ));
}

#[tokio::test]
async fn test_direct_answer_plan_launches_nothing() {
    let plan = RetrievalPlan {
        needs_direct_answer: true,
        // Stale flags are semantically ignored under direct answer.
        needs_memo_search: true,
        memo_search_query: "ignored".to_string(),
        ..RetrievalPlan::default()
    };
    let memo = StaticTool::new("memo_search", "unused");
    let invocations = memo.counter();
    let tools: Vec<Arc<dyn ToolCapability>> = vec![Arc::new(memo)];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let mut stats = ExecutionStats::new("planning");

    let results = RetrievalOrchestrator::default()
        .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(invocations.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pre_cancelled_token_returns_immediately() {
    let plan = memo_and_schedule_plan();
    let memo = StaticTool::new("memo_search", "unused");
    let invocations = memo.counter();
    let tools: Vec<Arc<dyn ToolCapability>> = vec![Arc::new(memo)];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut stats = ExecutionStats::new("planning");

    let err = RetrievalOrchestrator::default()
        .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Cancelled));
    assert_eq!(invocations.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hard_timeout_fires_for_stuck_tool() {
    let plan = RetrievalPlan {
        needs_memo_search: true,
        memo_search_query: "anything".to_string(),
        ..RetrievalPlan::default()
    };
    // The tool sleeps far beyond the configured ceiling.
    let tools: Vec<Arc<dyn ToolCapability>> =
        vec![Arc::new(SleepTool::new("memo_search", Duration::from_secs(30)))];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let mut stats = ExecutionStats::new("planning");

    let started = Instant::now();
    let err = RetrievalOrchestrator::new(Duration::from_millis(100))
        .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::HardTimeout(_)));
    // Must return within a bounded margin of the ceiling, not wait for
    // the tool.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_cancel_mid_flight_returns_partial_results() {
    common::init_tracing();
    let plan = memo_and_schedule_plan();
    let tools: Vec<Arc<dyn ToolCapability>> = vec![
        Arc::new(StaticTool::new("memo_search", "fast result")),
        Arc::new(SleepTool::new("schedule_query", Duration::from_secs(30))),
    ];
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let mut stats = ExecutionStats::new("planning");

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let results = RetrievalOrchestrator::default()
        .run(&cancel, &plan, &tools, &emitter(&sink), &mut stats)
        .await
        .unwrap();

    // The fast tool's result survives; the stuck one is simply absent.
    assert_eq!(results.get("memo_search").map(String::as_str), Some("fast result"));
    assert!(!results.contains_key("schedule_query"));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(stats.tool_calls, 1);
}
