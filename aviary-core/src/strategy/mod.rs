//! Execution strategies
//!
//! A strategy is one interchangeable algorithm for turning
//! (input, history, tools, model) into an answer. Four variants exist;
//! configuration selects one via [`resolve_strategy`], there is no
//! open-ended registration:
//!
//! - [`ReactStrategy`] - reasoning/acting loop over free-text tool directives
//! - [`DirectStrategy`] - native structured tool calling
//! - [`PlanningStrategy`] - plan, retrieve concurrently, synthesize
//! - [`ReflexionStrategy`] - self-critique and refinement on top of React

pub(crate) mod helpers;

mod direct;
mod planning;
mod react;
mod reflexion;

pub use direct::DirectStrategy;
pub use planning::PlanningStrategy;
pub use react::ReactStrategy;
pub use reflexion::ReflexionStrategy;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::events::{EventError, EventSink};
use crate::llm::{LanguageModel, LlmError};
use crate::orchestrator::OrchestratorError;
use crate::stats::ExecutionStats;
use crate::tool::ToolCapability;
use crate::types::Message;

/// Everything a strategy needs for one execution
pub struct StrategyContext<'a> {
    /// Cancellation signal; checked before every new round-trip
    pub cancel: &'a CancellationToken,
    /// The user utterance
    pub input: &'a str,
    /// Prior conversation turns
    pub history: &'a [Message],
    /// Tools available to this execution
    pub tools: &'a [Arc<dyn ToolCapability>],
    /// The model capability
    pub llm: &'a dyn LanguageModel,
    /// Optional event sink for real-time observation
    pub sink: Option<Arc<dyn EventSink>>,
}

impl Clone for StrategyContext<'_> {
    fn clone(&self) -> Self {
        Self {
            cancel: self.cancel,
            input: self.input,
            history: self.history,
            tools: self.tools,
            llm: self.llm,
            sink: self.sink.clone(),
        }
    }
}

/// Result of a successful strategy execution
#[derive(Debug)]
pub struct Execution {
    /// The final answer text
    pub answer: String,
    /// Statistics accumulated during the execution
    pub stats: ExecutionStats,
}

/// Errors from strategy execution
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// A model round-trip failed; `phase` names the failing step
    #[error("{phase} failed: {source}")]
    Llm {
        phase: &'static str,
        #[source]
        source: LlmError,
    },

    /// The reasoning loop exhausted its iteration budget
    #[error("max iterations ({0}) exceeded without a final answer")]
    IterationLimit(usize),

    /// The model produced neither content nor tool calls
    #[error("model returned empty response after {0} calls")]
    EmptyResponse(u32),

    /// The event sink rejected a load-bearing event
    #[error("event sink rejected {kind} event: {source}")]
    EventSink {
        kind: &'static str,
        #[source]
        source: EventError,
    },

    /// The caller cancelled the execution
    #[error("execution cancelled")]
    Cancelled,

    /// The retrieval orchestration failed
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] OrchestratorError),
}

/// One interchangeable execution algorithm
#[async_trait::async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Strategy name for logging and statistics
    fn name(&self) -> &'static str;

    /// Run the strategy to completion, streaming events along the way
    async fn execute(&self, ctx: StrategyContext<'_>) -> Result<Execution, StrategyError>;
}

/// The closed set of strategy selections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Reasoning/acting loop with free-text tool directives
    React,
    /// Native structured tool calling
    Direct,
    /// Two-phase planning with concurrent retrieval
    Planning,
    /// Self-reflection and refinement
    Reflexion,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::React => "react",
            StrategyKind::Direct => "direct",
            StrategyKind::Planning => "planning",
            StrategyKind::Reflexion => "reflexion",
        };
        write!(f, "{name}")
    }
}

/// Returned when a configuration names a strategy that does not exist
#[derive(Debug, thiserror::Error)]
#[error("unknown strategy: {0}")]
pub struct UnknownStrategyError(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "react" => Ok(StrategyKind::React),
            "direct" => Ok(StrategyKind::Direct),
            "planning" => Ok(StrategyKind::Planning),
            "reflexion" => Ok(StrategyKind::Reflexion),
            other => Err(UnknownStrategyError(other.to_string())),
        }
    }
}

/// Map a strategy selection to an instance. Pure: no registries, no
/// hidden state.
pub fn resolve_strategy(kind: StrategyKind, config: &AgentConfig) -> Box<dyn ExecutionStrategy> {
    let max_iterations = config.effective_max_iterations();
    match kind {
        StrategyKind::React => Box::new(ReactStrategy::new(max_iterations)),
        StrategyKind::Direct => Box::new(DirectStrategy::new(max_iterations)),
        StrategyKind::Planning => Box::new(PlanningStrategy::new(
            config.retrieval_timeout(),
            config.casual_chat.clone(),
        )),
        StrategyKind::Reflexion => Box::new(ReflexionStrategy::new(
            max_iterations,
            config.max_refinements,
            config.quality_threshold,
        )),
    }
}
