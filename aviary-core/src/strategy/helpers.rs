//! Shared helpers used by every strategy: message assembly, stream
//! collection, answer streaming, and the single tool-invocation path.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::events::{Emitter, EventMeta, ExecEvent, ToolStatus};
use crate::llm::{CallUsage, LlmError, StreamEvent};
use crate::stats::ExecutionStats;
use crate::text::truncate;
use crate::tool::{find_tool, ToolCapability, ToolError};
use crate::types::Message;

/// Chunk size, in characters, for simulated answer streaming
pub(crate) const STREAM_CHUNK_CHARS: usize = 80;

/// Maximum characters of tool input carried in a `tool_use` event
pub(crate) const INPUT_SUMMARY_MAX_CHARS: usize = 120;

/// Maximum characters of tool output carried in a `tool_result` event
pub(crate) const RESULT_EVENT_MAX_CHARS: usize = 500;

/// Append the current user input to the conversation history.
pub(crate) fn build_messages_with_input(history: &[Message], input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(Message::user(input));
    messages
}

/// Human-readable preview of a tool input for telemetry.
///
/// Prefers a `command`, `query`, or `path` field when the input is a JSON
/// object carrying one; otherwise a truncated dump of the raw input.
pub(crate) fn input_summary(input: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(input) {
        for field in ["command", "query", "path"] {
            if let Some(serde_json::Value::String(value)) = map.get(field) {
                if !value.is_empty() {
                    return truncate(value, INPUT_SUMMARY_MAX_CHARS);
                }
            }
        }
    }
    truncate(input, INPUT_SUMMARY_MAX_CHARS)
}

/// Where streamed text deltas are routed
#[derive(Clone, Copy)]
pub(crate) enum DeltaRoute {
    /// Forward as telemetry `thinking` events
    Thinking,
    /// Forward as load-bearing `answer` events
    Answer,
}

/// Accumulated result of a drained chat stream
pub(crate) struct StreamCollection {
    pub content: String,
    pub usage: Option<CallUsage>,
}

/// Drain a chat stream, forwarding each text delta through the chosen
/// route and accumulating the full content and usage.
pub(crate) async fn collect_chat_stream(
    mut stream: BoxStream<'static, Result<StreamEvent, LlmError>>,
    events: &Emitter,
    route: DeltaRoute,
    phase: &'static str,
    cancel: &CancellationToken,
) -> Result<StreamCollection, super::StrategyError> {
    let mut collection = StreamCollection {
        content: String::new(),
        usage: None,
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(super::StrategyError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            None => return Ok(collection),
            Some(Err(source)) => return Err(super::StrategyError::Llm { phase, source }),
            Some(Ok(StreamEvent::Completed { usage })) => {
                if usage.is_some() {
                    collection.usage = usage;
                }
            }
            Some(Ok(StreamEvent::TextDelta(delta))) => {
                match route {
                    DeltaRoute::Thinking => events.telemetry(&ExecEvent::Thinking {
                        text: delta.clone(),
                        meta: EventMeta::default(),
                    }),
                    DeltaRoute::Answer => {
                        events
                            .critical(&ExecEvent::Answer {
                                text: delta.clone(),
                            })
                            .map_err(|source| super::StrategyError::EventSink {
                                kind: "answer",
                                source,
                            })?;
                    }
                }
                collection.content.push_str(&delta);
            }
        }
    }
}

/// Stream a complete answer to the sink in character-safe chunks.
///
/// Answer events are load-bearing: a sink error aborts the strategy.
pub(crate) fn stream_answer(answer: &str, events: &Emitter) -> Result<(), super::StrategyError> {
    let chars: Vec<char> = answer.chars().collect();
    for chunk in chars.chunks(STREAM_CHUNK_CHARS) {
        let text: String = chunk.iter().collect();
        events
            .critical(&ExecEvent::Answer { text })
            .map_err(|source| super::StrategyError::EventSink {
                kind: "answer",
                source,
            })?;
    }
    Ok(())
}

/// Execute one tool call with full event coverage: a `tool_use` event
/// before, elapsed-time measurement around the invocation, a
/// `tool_result` event after, and stats recording on success.
///
/// Tool errors are never fatal to the enclosing strategy - callers turn
/// them into an `Error: …` message fed back to the model.
pub(crate) async fn run_tool_with_events(
    tools: &[Arc<dyn ToolCapability>],
    name: &str,
    input: &str,
    events: &Emitter,
    stats: &mut ExecutionStats,
    run_started: Instant,
) -> Result<String, ToolError> {
    let tool_id = uuid::Uuid::new_v4().to_string();

    events.telemetry(&ExecEvent::ToolUse {
        summary: input_summary(input),
        meta: EventMeta {
            tool_name: Some(name.to_string()),
            tool_id: Some(tool_id.clone()),
            status: Some(ToolStatus::Running),
            total_duration_ms: Some(run_started.elapsed().as_millis() as u64),
            ..EventMeta::default()
        },
    });

    let started = Instant::now();
    let outcome = match find_tool(tools, name) {
        Some(tool) => tool.invoke(input).await,
        None => Err(ToolError::NotFound(name.to_string())),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            events.telemetry(&ExecEvent::ToolResult {
                output: truncate(&output, RESULT_EVENT_MAX_CHARS),
                meta: EventMeta {
                    tool_name: Some(name.to_string()),
                    tool_id: Some(tool_id),
                    status: Some(ToolStatus::Success),
                    duration_ms: Some(duration_ms),
                    total_duration_ms: Some(run_started.elapsed().as_millis() as u64),
                    ..EventMeta::default()
                },
            });
            stats.record_tool(name, duration_ms);
            Ok(output)
        }
        Err(err) => {
            events.telemetry(&ExecEvent::ToolResult {
                output: format!("Error: {err}"),
                meta: EventMeta {
                    tool_name: Some(name.to_string()),
                    tool_id: Some(tool_id),
                    status: Some(ToolStatus::Error),
                    duration_ms: Some(duration_ms),
                    total_duration_ms: Some(run_started.elapsed().as_millis() as u64),
                    error: Some(err.to_string()),
                    ..EventMeta::default()
                },
            });
            Err(err)
        }
    }
}
