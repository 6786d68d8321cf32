//! Execution and session statistics
//!
//! [`ExecutionStats`] is a mutable accumulator owned by exactly one
//! in-flight execution. [`SessionStats`] aggregates across the executions
//! of one agent instance and is safe for concurrent use; readers always
//! get a [`SessionSnapshot`] copy, never a view of live state.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::llm::CallUsage;

/// Metrics for a single strategy execution
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStats {
    /// Strategy that produced these stats
    pub strategy: &'static str,

    /// Number of model round-trips
    pub llm_calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,

    /// Number of successful tool invocations
    pub tool_calls: u32,
    /// Time spent inside tool invocations
    pub tool_duration_ms: u64,
    /// Wall time for the whole execution, set once at completion
    pub total_duration_ms: u64,

    /// De-duplicated names of tools that ran successfully
    pub tools_used: Vec<String>,
}

impl ExecutionStats {
    pub fn new(strategy: &'static str) -> Self {
        Self {
            strategy,
            llm_calls: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            tool_calls: 0,
            tool_duration_ms: 0,
            total_duration_ms: 0,
            tools_used: Vec::new(),
        }
    }

    /// Add one model call's statistics. The single accumulation point for
    /// LLM metrics; every field only ever grows.
    pub fn accumulate_llm(&mut self, usage: &CallUsage) {
        self.llm_calls += 1;
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;
        self.cache_write_tokens += usage.cache_write_tokens;
    }

    /// Record one successful tool invocation
    pub fn record_tool(&mut self, name: &str, duration_ms: u64) {
        self.tool_calls += 1;
        self.tool_duration_ms += duration_ms;
        if !self.tools_used.iter().any(|t| t == name) {
            self.tools_used.push(name.to_string());
        }
    }

    /// Fold another execution's stats into this one (used by strategies
    /// that delegate to an inner strategy)
    pub fn merge(&mut self, other: &ExecutionStats) {
        self.llm_calls += other.llm_calls;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
        self.tool_calls += other.tool_calls;
        self.tool_duration_ms += other.tool_duration_ms;
        for tool in &other.tools_used {
            if !self.tools_used.iter().any(|t| t == tool) {
                self.tools_used.push(tool.clone());
            }
        }
    }
}

/// Point-in-time copy of an agent's session aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub agent: String,
    pub started_at: DateTime<Utc>,
    pub executions: u32,
    pub llm_calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub tool_calls: u32,
    pub total_duration_ms: u64,
    pub tools_used: Vec<String>,
    pub modified_files: Vec<String>,
}

#[derive(Debug)]
struct SessionInner {
    started_at: DateTime<Utc>,
    executions: u32,
    llm_calls: u32,
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
    cache_read_tokens: u64,
    cache_write_tokens: u64,
    tool_calls: u32,
    total_duration_ms: u64,
    tools_used: BTreeSet<String>,
    modified_files: Vec<String>,
}

/// Aggregate statistics across the executions of one agent instance
///
/// Internally locked; callers never lock it externally.
#[derive(Debug)]
pub struct SessionStats {
    agent: String,
    inner: Mutex<SessionInner>,
}

impl SessionStats {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            inner: Mutex::new(SessionInner {
                started_at: Utc::now(),
                executions: 0,
                llm_calls: 0,
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
                cache_read_tokens: 0,
                cache_write_tokens: 0,
                tool_calls: 0,
                total_duration_ms: 0,
                tools_used: BTreeSet::new(),
                modified_files: Vec::new(),
            }),
        }
    }

    /// Fold one completed execution into the session aggregate
    pub fn absorb(&self, stats: &ExecutionStats, wall: Duration) {
        let mut inner = self.inner.lock();
        inner.executions += 1;
        inner.llm_calls += stats.llm_calls;
        inner.prompt_tokens += stats.prompt_tokens;
        inner.completion_tokens += stats.completion_tokens;
        inner.total_tokens += stats.total_tokens;
        inner.cache_read_tokens += stats.cache_read_tokens;
        inner.cache_write_tokens += stats.cache_write_tokens;
        inner.tool_calls += stats.tool_calls;
        inner.total_duration_ms += wall.as_millis() as u64;
        for tool in &stats.tools_used {
            inner.tools_used.insert(tool.clone());
        }
    }

    /// Record a modified file path, de-duplicated
    pub fn record_file_modification(&self, path: &str) {
        if path.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        if !inner.modified_files.iter().any(|p| p == path) {
            inner.modified_files.push(path.to_string());
        }
    }

    /// Take a consistent copy of the aggregate
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            agent: self.agent.clone(),
            started_at: inner.started_at,
            executions: inner.executions,
            llm_calls: inner.llm_calls,
            prompt_tokens: inner.prompt_tokens,
            completion_tokens: inner.completion_tokens,
            total_tokens: inner.total_tokens,
            cache_read_tokens: inner.cache_read_tokens,
            cache_write_tokens: inner.cache_write_tokens,
            tool_calls: inner.tool_calls,
            total_duration_ms: inner.total_duration_ms,
            tools_used: inner.tools_used.iter().cloned().collect(),
            modified_files: inner.modified_files.clone(),
        }
    }
}
