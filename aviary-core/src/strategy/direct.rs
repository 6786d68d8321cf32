//! Native tool-calling strategy
//!
//! Relies on the model's structured tool-call output instead of parsing
//! free text for a directive. Tool calls are executed sequentially in the
//! order the model issued them, results are appended as synthetic turns,
//! and the model is re-invoked until it produces a response with content
//! and no tool calls.

use std::time::Instant;

use tracing::warn;

use super::helpers::{build_messages_with_input, run_tool_with_events, stream_answer};
use super::{Execution, ExecutionStrategy, StrategyContext, StrategyError};
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::events::{Emitter, EventMeta, ExecEvent};
use crate::stats::ExecutionStats;
use crate::tool::ToolCapability;
use crate::types::{Message, ToolDescriptor};

/// Native structured tool calling
#[derive(Debug, Clone)]
pub struct DirectStrategy {
    max_iterations: usize,
}

impl DirectStrategy {
    pub fn new(max_iterations: usize) -> Self {
        let max_iterations = if max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            max_iterations
        };
        Self { max_iterations }
    }
}

/// Build model-facing descriptors for the available tools
fn tool_descriptors(tools: &[std::sync::Arc<dyn ToolCapability>]) -> Vec<ToolDescriptor> {
    tools
        .iter()
        .map(|t| ToolDescriptor {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters(),
        })
        .collect()
}

#[async_trait::async_trait]
impl ExecutionStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn execute(&self, ctx: StrategyContext<'_>) -> Result<Execution, StrategyError> {
        let mut stats = ExecutionStats::new(self.name());
        let started = Instant::now();
        let events = Emitter::new(ctx.sink.clone());

        let descriptors = tool_descriptors(ctx.tools);
        let mut messages = build_messages_with_input(ctx.history, ctx.input);

        if ctx.cancel.is_cancelled() {
            return Err(StrategyError::Cancelled);
        }

        let mut response = ctx
            .llm
            .chat_with_tools(messages.clone(), descriptors.clone())
            .await
            .map_err(|source| StrategyError::Llm {
                phase: "tool-augmented chat",
                source,
            })?;
        stats.accumulate_llm(&response.usage);

        events.telemetry(&ExecEvent::Thinking {
            text: String::new(),
            meta: EventMeta {
                prompt_tokens: Some(response.usage.prompt_tokens),
                completion_tokens: Some(response.usage.completion_tokens),
                cache_read_tokens: Some(response.usage.cache_read_tokens),
                total_duration_ms: Some(started.elapsed().as_millis() as u64),
                ..EventMeta::default()
            },
        });

        while (stats.llm_calls as usize) < self.max_iterations {
            if response.tool_calls.is_empty() {
                break;
            }

            // Execute requested calls in model order; result order is
            // observable to the model on the next turn.
            messages.push(Message::assistant(response.content.clone()));
            for call in &response.tool_calls {
                let result = run_tool_with_events(
                    ctx.tools,
                    &call.name,
                    &call.arguments,
                    &events,
                    &mut stats,
                    started,
                )
                .await
                .unwrap_or_else(|err| {
                    warn!(tool = %call.name, error = %err, "tool execution failed");
                    format!("Error: {err}")
                });

                messages.push(Message::user(format!(
                    "[Result from {}]: {}",
                    call.name, result
                )));
            }

            if !response.content.is_empty() {
                // The model answered and called tools in one turn; the
                // content is the final answer.
                stream_answer(&response.content, &events)?;
                stats.total_duration_ms = started.elapsed().as_millis() as u64;
                return Ok(Execution {
                    answer: response.content,
                    stats,
                });
            }

            if ctx.cancel.is_cancelled() {
                return Err(StrategyError::Cancelled);
            }

            response = ctx
                .llm
                .chat_with_tools(messages.clone(), descriptors.clone())
                .await
                .map_err(|source| StrategyError::Llm {
                    phase: "follow-up tool-augmented chat",
                    source,
                })?;
            stats.accumulate_llm(&response.usage);
        }

        if !response.content.is_empty() {
            stream_answer(&response.content, &events)?;
            stats.total_duration_ms = started.elapsed().as_millis() as u64;
            return Ok(Execution {
                answer: response.content,
                stats,
            });
        }

        Err(StrategyError::EmptyResponse(stats.llm_calls))
    }
}
