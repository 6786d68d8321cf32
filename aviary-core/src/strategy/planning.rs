//! Plan-then-retrieve-then-synthesize strategy
//!
//! Three phases: (1) one terse planning call decides which retrieval
//! tools to run; (2) the orchestrator fans out to those tools
//! concurrently, tolerating partial failure; (3) one streaming synthesis
//! call answers from the concatenated retrieval results. A plan that says
//! direct-answer skips retrieval entirely.

use std::time::{Duration, Instant};

use tracing::debug;

use super::helpers::{build_messages_with_input, collect_chat_stream, stream_answer, DeltaRoute};
use super::{Execution, ExecutionStrategy, StrategyContext, StrategyError};
use crate::events::{Emitter, EventMeta, ExecEvent};
use crate::orchestrator::RetrievalOrchestrator;
use crate::plan::{CasualChatConfig, RetrievalPlan};
use crate::stats::ExecutionStats;
use crate::types::Message;

const TOTAL_PHASES: u32 = 3;

/// Two-phase planning with concurrent retrieval
#[derive(Debug, Clone)]
pub struct PlanningStrategy {
    orchestrator: RetrievalOrchestrator,
    casual_chat: CasualChatConfig,
}

impl PlanningStrategy {
    pub fn new(retrieval_timeout: Duration, casual_chat: CasualChatConfig) -> Self {
        Self {
            orchestrator: RetrievalOrchestrator::new(retrieval_timeout),
            casual_chat,
        }
    }

    async fn create_plan(
        &self,
        ctx: &StrategyContext<'_>,
        stats: &mut ExecutionStats,
    ) -> Result<RetrievalPlan, StrategyError> {
        let mut messages = Vec::with_capacity(ctx.history.len() + 2);
        messages.push(Message::system(build_planning_prompt(ctx)));
        messages.extend_from_slice(ctx.history);
        messages.push(Message::user(ctx.input));

        let completion = ctx
            .llm
            .chat(messages)
            .await
            .map_err(|source| StrategyError::Llm {
                phase: "create plan",
                source,
            })?;
        stats.accumulate_llm(&completion.usage);

        let plan = RetrievalPlan::parse(&completion.text, ctx.input, &self.casual_chat);
        debug!(
            memo_search = plan.needs_memo_search,
            schedule_query = plan.needs_schedule_query,
            schedule_add = plan.needs_schedule_add,
            schedule_update = plan.needs_schedule_update,
            free_time = plan.needs_free_time,
            direct_answer = plan.needs_direct_answer,
            "retrieval plan created"
        );
        Ok(plan)
    }
}

#[async_trait::async_trait]
impl ExecutionStrategy for PlanningStrategy {
    fn name(&self) -> &'static str {
        "planning"
    }

    async fn execute(&self, ctx: StrategyContext<'_>) -> Result<Execution, StrategyError> {
        let mut stats = ExecutionStats::new(self.name());
        let started = Instant::now();
        let events = Emitter::new(ctx.sink.clone());

        if ctx.cancel.is_cancelled() {
            return Err(StrategyError::Cancelled);
        }

        // Phase 1: plan
        emit_phase(&events, "planning", 1, started);
        let plan = self.create_plan(&ctx, &mut stats).await?;

        if plan.needs_direct_answer {
            // Casual chat: answer directly, no retrieval.
            emit_thinking(&events, "synthesizing", 3, started);
            if ctx.cancel.is_cancelled() {
                return Err(StrategyError::Cancelled);
            }

            let completion = ctx
                .llm
                .chat(build_messages_with_input(ctx.history, ctx.input))
                .await
                .map_err(|source| StrategyError::Llm {
                    phase: "direct answer",
                    source,
                })?;
            stats.accumulate_llm(&completion.usage);

            stream_answer(&completion.text, &events)?;
            stats.total_duration_ms = started.elapsed().as_millis() as u64;
            return Ok(Execution {
                answer: completion.text,
                stats,
            });
        }

        // Phase 2: concurrent retrieval
        emit_phase(&events, "retrieval", 2, started);
        emit_thinking(&events, "retrieving", 2, started);
        let results = self
            .orchestrator
            .run(ctx.cancel, &plan, ctx.tools, &events, &mut stats)
            .await?;

        // Phase 3: streaming synthesis
        emit_phase(&events, "synthesis", 3, started);
        emit_thinking(&events, "synthesizing", 3, started);
        if ctx.cancel.is_cancelled() {
            return Err(StrategyError::Cancelled);
        }

        let synthesis_prompt = build_synthesis_prompt(ctx.input, &results);
        let mut messages = Vec::with_capacity(ctx.history.len() + 1);
        messages.extend_from_slice(ctx.history);
        messages.push(Message::user(synthesis_prompt));

        let synthesis_started = Instant::now();
        let stream = ctx
            .llm
            .chat_stream(messages)
            .await
            .map_err(|source| StrategyError::Llm {
                phase: "synthesis streaming",
                source,
            })?;
        let collected = collect_chat_stream(
            stream,
            &events,
            DeltaRoute::Answer,
            "synthesis streaming",
            ctx.cancel,
        )
        .await?;
        if let Some(usage) = collected.usage {
            stats.accumulate_llm(&usage);
        }

        debug!(
            content_length = collected.content.len(),
            duration_ms = synthesis_started.elapsed().as_millis() as u64,
            "synthesis completed"
        );

        stats.total_duration_ms = started.elapsed().as_millis() as u64;
        Ok(Execution {
            answer: collected.content,
            stats,
        })
    }
}

fn emit_phase(events: &Emitter, phase: &str, step: u32, started: Instant) {
    events.telemetry(&ExecEvent::PhaseChange {
        phase: phase.to_string(),
        meta: EventMeta {
            current_step: Some(step),
            total_steps: Some(TOTAL_PHASES),
            total_duration_ms: Some(started.elapsed().as_millis() as u64),
            ..EventMeta::default()
        },
    });
}

fn emit_thinking(events: &Emitter, text: &str, step: u32, started: Instant) {
    events.telemetry(&ExecEvent::Thinking {
        text: text.to_string(),
        meta: EventMeta {
            current_step: Some(step),
            total_steps: Some(TOTAL_PHASES),
            total_duration_ms: Some(started.elapsed().as_millis() as u64),
            ..EventMeta::default()
        },
    });
}

/// System prompt for the planning call: the available tools plus the
/// line-oriented output format the parser understands.
fn build_planning_prompt(ctx: &StrategyContext<'_>) -> String {
    let mut prompt = String::from(
        "You are a planning assistant. Analyze the user's request and decide which tools to use.\n\nAvailable tools:\n",
    );
    for tool in ctx.tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
    }
    prompt.push_str(
        "\nOutput format (one per line, no numbering):\n\
         memo_search: <query>\n\
         schedule_query: <start> to <end>\n\
         schedule_add: <json>\n\
         schedule_update: <json>\n\
         find_free_time: <date>\n\
         direct_answer\n",
    );
    prompt
}

/// User-side prompt for the synthesis call embedding the retrieval results.
fn build_synthesis_prompt(
    input: &str,
    results: &std::collections::HashMap<String, String>,
) -> String {
    let mut prompt = format!("User request: {input}\n\nRetrieval results:\n");

    let sections = [
        ("memo_search", "Memo search results"),
        ("schedule_query", "Schedule query results"),
        ("find_free_time", "Available time slots"),
        ("schedule_add", "Schedule creation result"),
        ("schedule_update", "Schedule update result"),
    ];
    for (key, label) in sections {
        if let Some(result) = results.get(key) {
            prompt.push_str(&format!("{label}:\n{result}\n\n"));
        }
    }

    prompt.push_str("Please provide a helpful response based on these results.");
    prompt
}
