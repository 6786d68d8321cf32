//! Self-reflection and refinement strategy
//!
//! Produces an initial answer with the React loop, then alternates
//! critique and rewrite rounds until the critique's weighted quality
//! score clears the threshold, the model reports no refinement is
//! needed, or the refinement budget runs out. A critique that fails to
//! parse as JSON is treated as a forced-refinement low-quality result -
//! never as a passing score.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::react::ReactStrategy;
use super::{Execution, ExecutionStrategy, StrategyContext, StrategyError};
use crate::events::{Emitter, EventMeta, ExecEvent};
use crate::stats::ExecutionStats;
use crate::types::Message;

/// Default weighted-quality score required to stop refining
pub(crate) const DEFAULT_QUALITY_THRESHOLD: f64 = 0.8;

/// Default number of critique/rewrite rounds
pub(crate) const DEFAULT_MAX_REFINEMENTS: usize = 2;

const ACCURACY_WEIGHT: f64 = 0.4;
const COMPLETENESS_WEIGHT: f64 = 0.35;
const CLARITY_WEIGHT: f64 = 0.25;

/// Structured output of one critique call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionReport {
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub completeness: f64,
    #[serde(default)]
    pub clarity: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub needs_refinement: bool,
}

impl ReflectionReport {
    /// Weighted overall score: accuracy 40%, completeness 35%, clarity 25%
    pub fn overall_quality(&self) -> f64 {
        self.accuracy * ACCURACY_WEIGHT
            + self.completeness * COMPLETENESS_WEIGHT
            + self.clarity * CLARITY_WEIGHT
    }

    /// The fail-safe report used when a critique cannot be parsed
    fn forced_refinement() -> Self {
        Self {
            accuracy: 0.5,
            completeness: 0.5,
            clarity: 0.5,
            issues: vec!["failed to parse reflection output".to_string()],
            suggestions: vec!["review and improve the response".to_string()],
            needs_refinement: true,
        }
    }
}

/// Self-reflection and refinement on top of React
#[derive(Debug, Clone)]
pub struct ReflexionStrategy {
    max_refinements: usize,
    quality_threshold: f64,
    inner: ReactStrategy,
}

impl ReflexionStrategy {
    pub fn new(max_iterations: usize, max_refinements: usize, quality_threshold: f64) -> Self {
        let max_refinements = if max_refinements == 0 {
            DEFAULT_MAX_REFINEMENTS
        } else {
            max_refinements
        };
        let quality_threshold = if quality_threshold <= 0.0 {
            DEFAULT_QUALITY_THRESHOLD
        } else {
            quality_threshold
        };
        Self {
            max_refinements,
            quality_threshold,
            inner: ReactStrategy::new(max_iterations),
        }
    }

    async fn reflect(
        &self,
        ctx: &StrategyContext<'_>,
        answer: &str,
        stats: &mut ExecutionStats,
    ) -> Result<ReflectionReport, StrategyError> {
        let prompt = format!(
            "{REFLECTION_PROMPT}\n\n## User Question\n{}\n\n## Response to Evaluate\n{}\n\nOutput ONLY valid JSON, no other text.",
            ctx.input, answer
        );
        let messages = vec![
            Message::system("You are an objective response evaluator. Output only valid JSON."),
            Message::user(prompt),
        ];

        let completion = ctx
            .llm
            .chat(messages)
            .await
            .map_err(|source| StrategyError::Llm {
                phase: "reflection",
                source,
            })?;
        stats.accumulate_llm(&completion.usage);

        let json = extract_json(&completion.text);
        match serde_json::from_str(json) {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!(error = %err, "unparseable reflection output, forcing refinement");
                Ok(ReflectionReport::forced_refinement())
            }
        }
    }

    async fn refine(
        &self,
        ctx: &StrategyContext<'_>,
        answer: &str,
        report: &ReflectionReport,
        stats: &mut ExecutionStats,
    ) -> Result<String, StrategyError> {
        let prompt = format!(
            "{REFINE_PROMPT}\n\n## Original Question\n{}\n\n## Current Response\n{}\n\n\
             ## Feedback\nQuality: accuracy={:.2}, completeness={:.2}, clarity={:.2}\n\n\
             ## Issues to Address\n- {}\n\n## Suggestions\n- {}",
            ctx.input,
            answer,
            report.accuracy,
            report.completeness,
            report.clarity,
            report.issues.join("\n- "),
            report.suggestions.join("\n- "),
        );
        let messages = vec![
            Message::system("You are a helpful assistant that improves responses based on feedback."),
            Message::user(prompt),
        ];

        let completion = ctx
            .llm
            .chat(messages)
            .await
            .map_err(|source| StrategyError::Llm {
                phase: "refinement",
                source,
            })?;
        stats.accumulate_llm(&completion.usage);

        Ok(completion.text)
    }
}

#[async_trait::async_trait]
impl ExecutionStrategy for ReflexionStrategy {
    fn name(&self) -> &'static str {
        "reflexion"
    }

    async fn execute(&self, ctx: StrategyContext<'_>) -> Result<Execution, StrategyError> {
        let mut stats = ExecutionStats::new(self.name());
        let started = Instant::now();
        let events = Emitter::new(ctx.sink.clone());

        emit_thinking(&events, "generating initial response", 1, started);

        let initial = self.inner.execute(ctx.clone()).await?;
        stats.merge(&initial.stats);
        let mut answer = initial.answer;

        for round in 1..=self.max_refinements {
            if ctx.cancel.is_cancelled() {
                return Err(StrategyError::Cancelled);
            }

            emit_thinking(
                &events,
                &format!("reflecting on quality ({round}/{})", self.max_refinements),
                2,
                started,
            );

            let report = match self.reflect(&ctx, &answer, &mut stats).await {
                Ok(report) => report,
                Err(err) => {
                    warn!(error = %err, "reflection call failed, keeping current answer");
                    break;
                }
            };

            let quality = report.overall_quality();
            if quality >= self.quality_threshold || !report.needs_refinement {
                debug!(quality, threshold = self.quality_threshold, "quality threshold met");
                break;
            }

            emit_thinking(
                &events,
                &format!("refining response (quality {:.0}%)", quality * 100.0),
                3,
                started,
            );

            match self.refine(&ctx, &answer, &report, &mut stats).await {
                Ok(refined) => answer = refined,
                Err(err) => {
                    warn!(error = %err, "refinement call failed, keeping current answer");
                    break;
                }
            }
        }

        stats.total_duration_ms = started.elapsed().as_millis() as u64;
        Ok(Execution { answer, stats })
    }
}

fn emit_thinking(events: &Emitter, text: &str, step: u32, started: Instant) {
    events.telemetry(&ExecEvent::Thinking {
        text: text.to_string(),
        meta: EventMeta {
            current_step: Some(step),
            total_steps: Some(3),
            total_duration_ms: Some(started.elapsed().as_millis() as u64),
            ..EventMeta::default()
        },
    });
}

/// Extract the first complete JSON object from a response that may wrap
/// it in prose or code fences. Falls back to the original text when no
/// valid object is found (the caller's parse then fails and forces
/// refinement).
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return trimmed;
    }

    let Some(start) = trimmed.find('{') else {
        return response;
    };

    let bytes = trimmed.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    let candidate = &trimmed[start..=offset];
                    if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                        return candidate;
                    }
                }
            }
            _ => {}
        }
    }

    response
}

const REFLECTION_PROMPT: &str = "\
Evaluate the following response objectively and output JSON.

## Evaluation Criteria

1. **accuracy** (0.0-1.0): Are all facts correct? Any hallucinations or errors?
2. **completeness** (0.0-1.0): Were all aspects of the user's question addressed?
3. **clarity** (0.0-1.0): Is the response well-structured and easy to understand?

## Output Format

{
  \"accuracy\": 0.0,
  \"completeness\": 0.0,
  \"clarity\": 0.0,
  \"issues\": [\"specific issue\"],
  \"suggestions\": [\"improvement suggestion\"],
  \"needs_refinement\": false
}

Respond with ONLY valid JSON.";

const REFINE_PROMPT: &str = "\
Improve the following response based on the feedback provided.

## Instructions

1. Address each issue mentioned in the feedback
2. Incorporate relevant suggestions
3. Keep the good parts of the original response
4. Make the improved response clear, accurate, and complete

Output only the improved response, no explanations.";
