//! Top-level error type
//!
//! Flattens the per-component error hierarchy into actionable categories
//! so callers can decide how to react without matching on every inner
//! type:
//!
//! - [`Error::Config`] - fix the configuration, never retried
//! - [`Error::Llm`] - the model round-trip failed
//! - [`Error::Tool`] - every requested retrieval tool failed
//! - [`Error::EventSink`] - the caller's own sink rejected a load-bearing event
//! - [`Error::Cancelled`] - the caller gave up
//! - [`Error::Timeout`] - a tool appears stuck (distinct from `Cancelled`)
//! - [`Error::Execution`] - the strategy ran out of budget or output

use thiserror::Error;

use crate::config::ConfigError;
use crate::orchestrator::OrchestratorError;
use crate::strategy::StrategyError;

/// Top-level error for agent execution
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration; fatal at construction time
    #[error("configuration error: {0}")]
    Config(String),

    /// A model round-trip failed
    #[error("model error: {0}")]
    Llm(String),

    /// Tool failure escalated to a hard error (all requested tools failed)
    #[error("tool error: {0}")]
    Tool(String),

    /// The event sink rejected an answer/error event
    #[error("event sink error: {0}")]
    EventSink(String),

    /// The caller cancelled the execution
    #[error("execution cancelled")]
    Cancelled,

    /// The orchestrator's hard ceiling fired; a tool appears stuck
    #[error("timeout: {0}")]
    Timeout(String),

    /// The strategy exhausted its budget or produced no output
    #[error("execution error: {0}")]
    Execution(String),
}

impl Error {
    /// Returns true if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if the caller cancelled the execution
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the orchestrator's stuck-task guard fired
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<OrchestratorError> for Error {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Cancelled => Self::Cancelled,
            OrchestratorError::HardTimeout(_) => Self::Timeout(err.to_string()),
            OrchestratorError::AllToolsFailed { .. } => Self::Tool(err.to_string()),
        }
    }
}

impl From<StrategyError> for Error {
    fn from(err: StrategyError) -> Self {
        match err {
            StrategyError::Cancelled => Self::Cancelled,
            StrategyError::Retrieval(inner) => inner.into(),
            StrategyError::Llm { .. } => Self::Llm(err.to_string()),
            StrategyError::EventSink { .. } => Self::EventSink(err.to_string()),
            StrategyError::IterationLimit(_) | StrategyError::EmptyResponse(_) => {
                Self::Execution(err.to_string())
            }
        }
    }
}

/// Result type for agent execution
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::time::Duration;

    #[test]
    fn test_from_orchestrator_error() {
        let err: Error = OrchestratorError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: Error = OrchestratorError::HardTimeout(Duration::from_secs(45)).into();
        assert!(err.is_timeout());

        let err: Error = OrchestratorError::AllToolsFailed { launched: 3 }.into();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[test]
    fn test_from_strategy_error() {
        let err: Error = StrategyError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: Error = StrategyError::IterationLimit(10).into();
        assert!(matches!(err, Error::Execution(_)));

        let err: Error = StrategyError::Llm {
            phase: "create plan",
            source: LlmError::Network("connection reset".into()),
        }
        .into();
        assert!(err.to_string().contains("create plan"));
    }

    #[test]
    fn test_cancellation_distinct_from_timeout() {
        // "Caller gave up" and "a tool appears stuck" must be tellable apart.
        let cancelled: Error = StrategyError::Retrieval(OrchestratorError::Cancelled).into();
        let stuck: Error =
            StrategyError::Retrieval(OrchestratorError::HardTimeout(Duration::from_secs(45)))
                .into();
        assert!(cancelled.is_cancelled() && !cancelled.is_timeout());
        assert!(stuck.is_timeout() && !stuck.is_cancelled());
    }

    #[test]
    fn test_from_config_error() {
        let err: Error = crate::config::ConfigError::MissingName.into();
        assert!(err.is_config());
    }
}
