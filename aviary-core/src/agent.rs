//! The externally callable agent
//!
//! Composes a response cache, a resolved execution strategy, session
//! statistics, and the event protocol into one unit. Callers construct an
//! [`Agent`] once per (configuration, user) pair and call
//! [`Agent::execute`] per request; requests for the same agent may run
//! concurrently.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{generate_cache_key, ResponseCache};
use crate::config::{AgentConfig, ConfigError};
use crate::error::{Error, Result};
use crate::events::{Emitter, EventSink, ExecEvent};
use crate::llm::LanguageModel;
use crate::stats::{SessionSnapshot, SessionStats};
use crate::strategy::{resolve_strategy, ExecutionStrategy, StrategyContext};
use crate::tool::ToolCapability;
use crate::types::Message;

/// A configured agent: strategy + cache + statistics over shared
/// LLM and tool capabilities
pub struct Agent {
    config: AgentConfig,
    user_id: i64,
    strategy: Box<dyn ExecutionStrategy>,
    llm: Arc<dyn LanguageModel>,
    tools: Vec<Arc<dyn ToolCapability>>,
    cache: Option<ResponseCache>,
    session: SessionStats,
}

impl Agent {
    /// Build an agent from configuration. Configuration errors are fatal
    /// here and never retried.
    pub fn new(
        config: AgentConfig,
        user_id: i64,
        llm: Arc<dyn LanguageModel>,
        tools: Vec<Arc<dyn ToolCapability>>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let strategy = resolve_strategy(config.strategy, &config);
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::new(config.cache.capacity, config.cache.ttl()));
        let session = SessionStats::new(config.name.clone());

        Ok(Self {
            config,
            user_id,
            strategy,
            llm,
            tools,
            cache,
            session,
        })
    }

    /// Agent name from the configuration
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Name of the resolved strategy
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Execute one request.
    ///
    /// Checks the cache first; on a miss, runs the configured strategy,
    /// stores the answer, and folds the execution statistics into the
    /// session aggregate. The final answer is also streamed through the
    /// sink as `answer` events by the strategy itself.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        input: &str,
        history: &[Message],
        sink: Option<Arc<dyn EventSink>>,
    ) -> Result<String> {
        let started = Instant::now();
        let events = Emitter::new(sink.clone());

        let cache_key = generate_cache_key(&self.config.name, self.user_id, input);
        if let Some(cache) = &self.cache {
            if let Some(answer) = cache.get(&cache_key) {
                info!(agent = %self.config.name, user_id = self.user_id, "cache hit");
                events.telemetry(&ExecEvent::Answer {
                    text: answer.clone(),
                });
                return Ok(answer);
            }
            debug!(agent = %self.config.name, user_id = self.user_id, "cache miss");
        }

        let ctx = StrategyContext {
            cancel,
            input,
            history,
            tools: &self.tools,
            llm: self.llm.as_ref(),
            sink,
        };
        let execution = self.strategy.execute(ctx).await.map_err(Error::from)?;

        if let Some(cache) = &self.cache {
            if !execution.answer.is_empty() {
                cache.insert(cache_key, execution.answer.clone());
            }
        }

        self.session.absorb(&execution.stats, started.elapsed());
        events.telemetry(&ExecEvent::SessionStats {
            snapshot: self.session.snapshot(),
        });

        info!(
            agent = %self.config.name,
            strategy = self.strategy.name(),
            duration_ms = started.elapsed().as_millis() as u64,
            llm_calls = execution.stats.llm_calls,
            tool_calls = execution.stats.tool_calls,
            "execution completed"
        );

        Ok(execution.answer)
    }

    /// A consistent copy of the session-level statistics
    pub fn session_stats(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Record a modified file path into the session statistics (used by
    /// coding-agent variants)
    pub fn record_file_modification(&self, path: &str) {
        self.session.record_file_modification(path);
    }
}
