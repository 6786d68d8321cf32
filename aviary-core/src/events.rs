//! Typed events emitted during strategy execution
//!
//! Events let callers observe execution in real time: reasoning phases,
//! tool invocations, streamed answer text, and statistics. They are
//! ephemeral - this crate never persists them.
//!
//! There are two delivery ports with different failure semantics, exposed
//! by [`Emitter`]: `critical` propagates a sink error to the caller (used
//! only for the load-bearing answer/error events), `telemetry` swallows
//! and logs it so a misbehaving observer cannot abort an execution.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::stats::SessionSnapshot;

/// Status of a tool invocation carried in [`EventMeta`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Success,
    Error,
}

/// Structured metadata attached to events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMeta {
    pub tool_name: Option<String>,
    pub tool_id: Option<String>,
    pub status: Option<ToolStatus>,
    /// Duration of the specific operation (e.g. one tool call)
    pub duration_ms: Option<u64>,
    /// Elapsed time since the execution started
    pub total_duration_ms: Option<u64>,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub cache_read_tokens: Option<u64>,
    pub error: Option<String>,
}

/// Events emitted during execution
#[derive(Debug, Clone)]
pub enum ExecEvent {
    /// The strategy is reasoning; `text` may carry streamed thinking deltas
    Thinking { text: String, meta: EventMeta },
    /// A tool invocation is starting; `summary` is a truncated input preview
    ToolUse { summary: String, meta: EventMeta },
    /// A tool invocation finished; `output` is truncated
    ToolResult { output: String, meta: EventMeta },
    /// A chunk of the final answer
    Answer { text: String },
    /// A user-visible error
    Error { message: String },
    /// Session-level statistics after an execution completes
    SessionStats { snapshot: SessionSnapshot },
    /// The strategy moved to a new processing phase
    PhaseChange { phase: String, meta: EventMeta },
    /// Free-form progress note
    Progress { message: String },
    /// A dangerous operation was blocked by an outer policy layer
    DangerBlock { reason: String },
    /// Structured memo search results (JSON payload)
    MemoQueryResult { payload: String },
    /// Structured schedule query results (JSON payload)
    ScheduleQueryResult { payload: String },
}

impl ExecEvent {
    /// Stable wire name for this event type
    pub fn kind(&self) -> &'static str {
        match self {
            ExecEvent::Thinking { .. } => "thinking",
            ExecEvent::ToolUse { .. } => "tool_use",
            ExecEvent::ToolResult { .. } => "tool_result",
            ExecEvent::Answer { .. } => "answer",
            ExecEvent::Error { .. } => "error",
            ExecEvent::SessionStats { .. } => "session_stats",
            ExecEvent::PhaseChange { .. } => "phase_change",
            ExecEvent::Progress { .. } => "progress",
            ExecEvent::DangerBlock { .. } => "danger_block",
            ExecEvent::MemoQueryResult { .. } => "memo_query_result",
            ExecEvent::ScheduleQueryResult { .. } => "schedule_query_result",
        }
    }
}

/// Error returned by an event sink
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EventError(pub String);

impl From<String> for EventError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Sink for observing execution events
pub trait EventSink: Send + Sync {
    /// Called for each event. A returned error only matters for the
    /// load-bearing answer/error events; see [`Emitter`].
    fn emit(&self, event: &ExecEvent) -> Result<(), EventError>;
}

/// Blanket implementation for closures
impl<F> EventSink for F
where
    F: Fn(&ExecEvent) -> Result<(), EventError> + Send + Sync,
{
    fn emit(&self, event: &ExecEvent) -> Result<(), EventError> {
        self(event)
    }
}

/// The two event ports used by strategies
///
/// Wraps an optional sink; an absent sink makes every emission a no-op.
/// Cheap to clone, so orchestrator tasks can carry their own handle.
#[derive(Clone)]
pub struct Emitter {
    sink: Option<Arc<dyn EventSink>>,
}

impl Emitter {
    pub fn new(sink: Option<Arc<dyn EventSink>>) -> Self {
        Self { sink }
    }

    /// An emitter with no sink attached
    pub fn none() -> Self {
        Self { sink: None }
    }

    /// Emit a load-bearing event (answer/error). Sink errors propagate and
    /// abort the calling strategy.
    pub fn critical(&self, event: &ExecEvent) -> Result<(), EventError> {
        match &self.sink {
            Some(sink) => sink.emit(event),
            None => Ok(()),
        }
    }

    /// Emit a telemetry event. Sink errors are logged and swallowed.
    pub fn telemetry(&self, event: &ExecEvent) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.emit(event) {
                warn!(event_type = event.kind(), error = %err, "event sink error swallowed");
            }
        }
    }
}
