//! Concurrent retrieval orchestrator
//!
//! Fans out one task per capability a [`RetrievalPlan`] requests,
//! aggregates results by key under a mutex, and counts failures with an
//! atomic so the failure check never contends with result writes.
//!
//! Failure policy: as long as at least one launched task succeeds, the
//! partial result map is returned with no error - failed tools appear as
//! `"<tool>_error"` entries and downstream synthesis works with whatever
//! succeeded. Only when every launched task fails does the orchestration
//! fail hard.
//!
//! Timeouts come in three tiers:
//! 1. token already cancelled before launch → [`OrchestratorError::Cancelled`]
//! 2. token cancelled while tasks are in flight → warn and return the
//!    partial results collected so far
//! 3. a local hard ceiling independent of the token →
//!    [`OrchestratorError::HardTimeout`], the stuck-task guard

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{Emitter, EventMeta, ExecEvent, ToolStatus};
use crate::plan::RetrievalPlan;
use crate::stats::ExecutionStats;
use crate::strategy::helpers::{input_summary, RESULT_EVENT_MAX_CHARS};
use crate::text::truncate;
use crate::tool::{find_tool, ToolCapability};

/// Errors from one orchestration
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The caller's token was already cancelled before any task launched
    #[error("retrieval cancelled before any tool was launched")]
    Cancelled,

    /// The local hard ceiling fired; at least one task appears stuck
    #[error("retrieval hard timeout after {0:?}: a tool appears stuck")]
    HardTimeout(Duration),

    /// Every launched task failed
    #[error("all {launched} retrieval tools failed")]
    AllToolsFailed { launched: u32 },
}

/// Runs the retrieval fan-out for the planning strategy
#[derive(Debug, Clone)]
pub struct RetrievalOrchestrator {
    hard_timeout: Duration,
}

impl RetrievalOrchestrator {
    /// Default hard ceiling for one orchestration
    pub const DEFAULT_HARD_TIMEOUT: Duration = Duration::from_secs(45);

    pub fn new(hard_timeout: Duration) -> Self {
        Self { hard_timeout }
    }

    /// Execute every retrieval the plan requests, concurrently.
    ///
    /// Returns the result map keyed by capability name; failed tools are
    /// recorded under `"<name>_error"`. Successful calls are counted into
    /// `stats` after the join.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        plan: &RetrievalPlan,
        tools: &[Arc<dyn ToolCapability>],
        events: &Emitter,
        stats: &mut ExecutionStats,
    ) -> Result<HashMap<String, String>, OrchestratorError> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let requests = plan.requests();
        if requests.is_empty() {
            return Ok(HashMap::new());
        }
        let launched = requests.len() as u32;

        let results: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
        let failures = Arc::new(AtomicU32::new(0));

        // Tasks observe a child token so an early return here tears the
        // whole fan-out down; dropping the JoinSet aborts stragglers.
        let child = cancel.child_token();
        let mut tasks: JoinSet<()> = JoinSet::new();

        for (name, input) in requests {
            let tool = find_tool(tools, name).cloned();
            let results = Arc::clone(&results);
            let failures = Arc::clone(&failures);
            let child = child.clone();
            let events = events.clone();

            tasks.spawn(async move {
                run_one(name, input, tool, child, events, results, failures).await;
            });
        }

        let join_all = async {
            while tasks.join_next().await.is_some() {}
        };

        tokio::select! {
            _ = join_all => {}
            _ = cancel.cancelled() => {
                child.cancel();
                let partial = std::mem::take(&mut *results.lock());
                warn!(
                    collected = partial.len(),
                    "retrieval cancelled mid-flight, returning partial results"
                );
                record_successes(stats, &partial);
                return Ok(partial);
            }
            _ = tokio::time::sleep(self.hard_timeout) => {
                child.cancel();
                return Err(OrchestratorError::HardTimeout(self.hard_timeout));
            }
        }

        let failed = failures.load(Ordering::Relaxed);
        if failed >= launched {
            return Err(OrchestratorError::AllToolsFailed { launched });
        }
        if failed > 0 {
            warn!(failed, launched, "partial retrieval failure, continuing with available results");
        }

        let map = std::mem::take(&mut *results.lock());
        record_successes(stats, &map);
        debug!(results = map.len(), "retrieval completed");
        Ok(map)
    }
}

impl Default for RetrievalOrchestrator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HARD_TIMEOUT)
    }
}

/// One fan-out task: invoke a single tool and record its outcome.
async fn run_one(
    name: &'static str,
    input: String,
    tool: Option<Arc<dyn ToolCapability>>,
    cancel: CancellationToken,
    events: Emitter,
    results: Arc<Mutex<HashMap<String, String>>>,
    failures: Arc<AtomicU32>,
) {
    let Some(tool) = tool else {
        failures.fetch_add(1, Ordering::Relaxed);
        results
            .lock()
            .insert(format!("{name}_error"), format!("tool not found: {name}"));
        return;
    };

    events.telemetry(&ExecEvent::ToolUse {
        summary: input_summary(&input),
        meta: EventMeta {
            tool_name: Some(name.to_string()),
            status: Some(ToolStatus::Running),
            ..EventMeta::default()
        },
    });

    let started = Instant::now();
    let outcome = tokio::select! {
        _ = cancel.cancelled() => return,
        outcome = tool.invoke(&input) => outcome,
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            events.telemetry(&ExecEvent::ToolResult {
                output: truncate(&output, RESULT_EVENT_MAX_CHARS),
                meta: EventMeta {
                    tool_name: Some(name.to_string()),
                    status: Some(ToolStatus::Success),
                    duration_ms: Some(duration_ms),
                    ..EventMeta::default()
                },
            });
            results.lock().insert(name.to_string(), output);
        }
        Err(err) => {
            failures.fetch_add(1, Ordering::Relaxed);
            events.telemetry(&ExecEvent::ToolResult {
                output: format!("Error: {err}"),
                meta: EventMeta {
                    tool_name: Some(name.to_string()),
                    status: Some(ToolStatus::Error),
                    duration_ms: Some(duration_ms),
                    error: Some(err.to_string()),
                    ..EventMeta::default()
                },
            });
            results.lock().insert(format!("{name}_error"), err.to_string());
        }
    }
}

/// Count successful entries (keys without the `_error` suffix) into stats.
fn record_successes(stats: &mut ExecutionStats, results: &HashMap<String, String>) {
    for key in results.keys() {
        if !key.ends_with("_error") {
            stats.tool_calls += 1;
            if !stats.tools_used.iter().any(|t| t == key) {
                stats.tools_used.push(key.clone());
            }
        }
    }
}
