//! Per-agent configuration surface
//!
//! Deserializable from an external config collaborator; every field has a
//! sensible default so a minimal config only needs a name and a strategy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::plan::CasualChatConfig;
use crate::strategy::StrategyKind;

/// Default reasoning-round budget
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Errors detected when validating a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("agent name is required")]
    MissingName,

    #[error(transparent)]
    UnknownStrategy(#[from] crate::strategy::UnknownStrategyError),

    #[error("cache capacity must be non-zero when the cache is enabled")]
    ZeroCacheCapacity,

    #[error("quality threshold must be within 0.0..=1.0, got {0}")]
    QualityThresholdOutOfRange(f64),
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether finished answers are cached at all
    #[serde(default)]
    pub enabled: bool,
    /// Maximum number of cached answers
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Per-entry time to live, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Configuration for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name, used in the cache key and statistics
    pub name: String,

    /// Which execution strategy to run
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,

    /// Reasoning-round budget; 0 is normalized to the default (10)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Reflexion only: weighted quality score that stops refinement
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Reflexion only: maximum critique/rewrite rounds
    #[serde(default = "default_max_refinements")]
    pub max_refinements: usize,

    /// Hard ceiling for one concurrent retrieval, in seconds
    #[serde(default = "default_retrieval_timeout_secs")]
    pub retrieval_timeout_secs: u64,

    /// Tunables for the casual-chat detector used by the planning fallback
    #[serde(default)]
    pub casual_chat: CasualChatConfig,
}

fn default_strategy() -> StrategyKind {
    StrategyKind::React
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_quality_threshold() -> f64 {
    0.8
}

fn default_max_refinements() -> usize {
    2
}

fn default_retrieval_timeout_secs() -> u64 {
    45
}

impl AgentConfig {
    /// A config with the given name and every other field defaulted
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategy: default_strategy(),
            max_iterations: default_max_iterations(),
            cache: CacheConfig::default(),
            quality_threshold: default_quality_threshold(),
            max_refinements: default_max_refinements(),
            retrieval_timeout_secs: default_retrieval_timeout_secs(),
            casual_chat: CasualChatConfig::default(),
        }
    }

    /// The iteration budget with the zero-means-default rule applied
    pub fn effective_max_iterations(&self) -> usize {
        if self.max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            self.max_iterations
        }
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }

    /// Check construction-time invariants. Fatal; never retried.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(ConfigError::QualityThresholdOutOfRange(
                self.quality_threshold,
            ));
        }
        Ok(())
    }
}
