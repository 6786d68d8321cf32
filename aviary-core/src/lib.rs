//! # Aviary
//!
//! The execution core of a multi-agent assistant: pluggable reasoning
//! strategies, concurrent tool retrieval, streaming events, statistics,
//! and response caching.
//!
//! Given a user utterance and conversation history, an [`Agent`] picks a
//! configured [`strategy::ExecutionStrategy`], invokes zero or more tools
//! (possibly concurrently), tolerates partial tool failure, and streams a
//! synthesized answer back through an [`EventSink`] while accumulating
//! latency and token statistics.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use aviary_core::{Agent, AgentConfig, StrategyKind};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> aviary_core::Result<()> {
//!     let mut config = AgentConfig::named("amazing");
//!     config.strategy = StrategyKind::Planning;
//!     config.cache.enabled = true;
//!
//!     let agent = Agent::new(config, user_id, llm, tools)?;
//!
//!     let cancel = CancellationToken::new();
//!     let answer = agent.execute(&cancel, "what's on my schedule?", &[], None).await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Strategies
//!
//! Four interchangeable algorithms sit behind one contract; configuration
//! selects one per agent:
//!
//! - `react` - reasoning/acting loop over free-text tool directives
//! - `direct` - native structured tool calling
//! - `planning` - plan, retrieve concurrently, synthesize
//! - `reflexion` - self-critique and refinement on top of `react`
//!
//! ## Observing execution
//!
//! Implement [`EventSink`] (closures work too) to receive typed
//! [`ExecEvent`]s: reasoning phases, tool use/results, streamed answer
//! chunks, and session statistics. Sink errors only abort execution for
//! the load-bearing `answer`/`error` events; everything else is
//! telemetry and is logged-and-dropped on failure.

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod orchestrator;
pub mod plan;
pub mod stats;
pub mod strategy;
pub mod tool;
pub mod types;

mod text;

pub use agent::Agent;
pub use cache::{generate_cache_key, ResponseCache};
pub use config::{AgentConfig, CacheConfig, ConfigError, DEFAULT_MAX_ITERATIONS};
pub use error::{Error, Result};
pub use events::{Emitter, EventError, EventMeta, EventSink, ExecEvent, ToolStatus};
pub use llm::{CallUsage, ChatCompletion, LanguageModel, LlmError, StreamEvent, ToolChatResponse};
pub use orchestrator::{OrchestratorError, RetrievalOrchestrator};
pub use plan::{is_casual_chat, CasualChatConfig, RetrievalPlan};
pub use stats::{ExecutionStats, SessionSnapshot, SessionStats};
pub use strategy::{
    resolve_strategy, DirectStrategy, Execution, ExecutionStrategy, PlanningStrategy,
    ReactStrategy, ReflexionStrategy, StrategyContext, StrategyError, StrategyKind,
    UnknownStrategyError,
};
pub use tool::{find_tool, ToolCapability, ToolError};
pub use types::{Message, Role, ToolCallRequest, ToolDescriptor};
