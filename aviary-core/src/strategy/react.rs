//! Reasoning/acting loop strategy
//!
//! The model streams free text; when that text carries a
//! `TOOL: <name>` / `INPUT: <json>` directive, the named tool runs and
//! its result is fed back as a new turn. Text without a directive is the
//! final answer. Tool calls within one turn run sequentially because the
//! model must see earlier results before issuing the next call.

use std::time::Instant;

use tracing::warn;

use super::helpers::{
    build_messages_with_input, collect_chat_stream, run_tool_with_events, stream_answer,
    DeltaRoute,
};
use super::{Execution, ExecutionStrategy, StrategyContext, StrategyError};
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::events::{Emitter, EventMeta, ExecEvent};
use crate::stats::ExecutionStats;
use crate::text::truncate;
use crate::types::Message;

/// Maximum characters of pre-directive pleasantry text forwarded to the sink
const CLEAN_TEXT_MAX_CHARS: usize = 200;

/// The reasoning/acting loop
#[derive(Debug, Clone)]
pub struct ReactStrategy {
    max_iterations: usize,
}

impl ReactStrategy {
    pub fn new(max_iterations: usize) -> Self {
        let max_iterations = if max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            max_iterations
        };
        Self { max_iterations }
    }
}

#[async_trait::async_trait]
impl ExecutionStrategy for ReactStrategy {
    fn name(&self) -> &'static str {
        "react"
    }

    async fn execute(&self, ctx: StrategyContext<'_>) -> Result<Execution, StrategyError> {
        let mut stats = ExecutionStats::new(self.name());
        let started = Instant::now();
        let events = Emitter::new(ctx.sink.clone());

        let mut messages = build_messages_with_input(ctx.history, ctx.input);

        for iteration in 0..self.max_iterations {
            if ctx.cancel.is_cancelled() {
                return Err(StrategyError::Cancelled);
            }

            events.telemetry(&ExecEvent::Thinking {
                text: String::new(),
                meta: EventMeta {
                    current_step: Some(iteration as u32 + 1),
                    total_steps: Some(self.max_iterations as u32),
                    total_duration_ms: Some(started.elapsed().as_millis() as u64),
                    ..EventMeta::default()
                },
            });

            let stream = ctx
                .llm
                .chat_stream(messages.clone())
                .await
                .map_err(|source| StrategyError::Llm {
                    phase: "LLM streaming",
                    source,
                })?;
            let collected = collect_chat_stream(
                stream,
                &events,
                DeltaRoute::Thinking,
                "LLM streaming",
                ctx.cancel,
            )
            .await?;
            if let Some(usage) = collected.usage {
                stats.accumulate_llm(&usage);
            }
            let response = collected.content;

            let parsed = parse_tool_call(&response);
            let Some((tool_name, tool_input)) = parsed.tool else {
                // No directive: the response is the final answer.
                stream_answer(&response, &events)?;
                stats.total_duration_ms = started.elapsed().as_millis() as u64;
                return Ok(Execution {
                    answer: response,
                    stats,
                });
            };

            if !parsed.clean_text.is_empty() {
                events.telemetry(&ExecEvent::Answer {
                    text: parsed.clean_text,
                });
            }

            let result =
                run_tool_with_events(ctx.tools, &tool_name, &tool_input, &events, &mut stats, started)
                    .await
                    .unwrap_or_else(|err| {
                        warn!(tool = %tool_name, error = %err, "tool execution failed");
                        format!("Error: {err}")
                    });

            if ctx.cancel.is_cancelled() {
                return Err(StrategyError::Cancelled);
            }

            messages.push(Message::assistant(response));
            messages.push(Message::user(format!("Tool result: {result}")));
        }

        Err(StrategyError::IterationLimit(self.max_iterations))
    }
}

struct ParsedResponse {
    tool: Option<(String, String)>,
    clean_text: String,
}

/// Extract a `TOOL:` / `INPUT:` directive from a model response.
///
/// Text lines before the directive are collected as pleasantry text and
/// truncated; everything after the directive starts belongs to the call.
fn parse_tool_call(response: &str) -> ParsedResponse {
    let mut tool_name = String::new();
    let mut tool_input = String::new();
    let mut clean_parts: Vec<&str> = Vec::new();
    let mut in_tool_call = false;

    for raw_line in response.lines() {
        let line = raw_line.trim();

        if let Some(rest) = line.strip_prefix("TOOL:").or_else(|| line.strip_prefix("Tool:")) {
            tool_name = rest.trim().to_string();
            in_tool_call = true;
            continue;
        }

        if let Some(rest) = line
            .strip_prefix("INPUT:")
            .or_else(|| line.strip_prefix("Input:"))
        {
            tool_input = rest.trim().to_string();
            continue;
        }

        if !in_tool_call && !line.is_empty() {
            clean_parts.push(line);
        }
    }

    let clean_text = truncate(&clean_parts.join(" "), CLEAN_TEXT_MAX_CHARS);

    let tool = if tool_name.is_empty() {
        None
    } else {
        Some((tool_name, tool_input))
    };

    ParsedResponse { tool, clean_text }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_answer() {
        let parsed = parse_tool_call("The meeting is at 3pm.");
        assert!(parsed.tool.is_none());
        assert_eq!(parsed.clean_text, "The meeting is at 3pm.");
    }

    #[test]
    fn test_parse_tool_directive() {
        let parsed = parse_tool_call("Let me check.\nTOOL: schedule_query\nINPUT: {\"range\": \"today\"}");
        let (name, input) = parsed.tool.unwrap();
        assert_eq!(name, "schedule_query");
        assert_eq!(input, "{\"range\": \"today\"}");
        assert_eq!(parsed.clean_text, "Let me check.");
    }

    #[test]
    fn test_parse_mixed_case_directive() {
        let parsed = parse_tool_call("Tool: memo_search\nInput: {\"query\": \"rust\"}");
        let (name, input) = parsed.tool.unwrap();
        assert_eq!(name, "memo_search");
        assert_eq!(input, "{\"query\": \"rust\"}");
    }

    #[test]
    fn test_parse_directive_without_input() {
        let parsed = parse_tool_call("TOOL: find_free_time");
        let (name, input) = parsed.tool.unwrap();
        assert_eq!(name, "find_free_time");
        assert_eq!(input, "");
    }

    #[test]
    fn test_clean_text_is_truncated() {
        let long = format!("{}\nTOOL: memo_search\nINPUT: {{}}", "word ".repeat(100));
        let parsed = parse_tool_call(&long);
        assert!(parsed.tool.is_some());
        assert!(parsed.clean_text.chars().count() <= CLEAN_TEXT_MAX_CHARS + 3);
        assert!(parsed.clean_text.ends_with("..."));
    }

    #[test]
    fn test_zero_max_iterations_normalizes_to_default() {
        let strategy = ReactStrategy::new(0);
        assert_eq!(strategy.max_iterations, DEFAULT_MAX_ITERATIONS);
    }
}
