//! Retrieval plan parsing
//!
//! The planning strategy asks the model for a terse, line-oriented plan
//! naming which retrieval tools to run and with what parameters. This
//! module parses that output into an immutable [`RetrievalPlan`].
//!
//! Expected plan lines, one per line:
//!
//! ```text
//! memo_search: <query>
//! schedule_query: <time range>
//! schedule_add: <json>
//! schedule_update: <json>
//! find_free_time: <date>
//! direct_answer
//! ```

use serde::{Deserialize, Serialize};

/// Tunables for the casual-chat detector used by the default-plan
/// fallback. Thresholds count characters, not bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasualChatConfig {
    /// Inputs shorter than this are always treated as casual
    pub short_threshold: usize,
    /// Inputs shorter than this with no retrieval keyword are casual
    pub moderate_threshold: usize,
    /// Keywords whose presence marks an input as a retrieval request
    pub keywords: Vec<String>,
}

impl Default for CasualChatConfig {
    fn default() -> Self {
        Self {
            short_threshold: 30,
            moderate_threshold: 100,
            keywords: [
                "search", "find", "memo", "note", "schedule", "remind", "todo", "plan", "what's",
                "how many", "when", "where", "about", "summarize", "review", "count",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Returns true when the input reads like casual conversation that needs
/// no retrieval: very short, or moderately short without any retrieval
/// keyword.
pub fn is_casual_chat(input: &str, config: &CasualChatConfig) -> bool {
    let length = input.chars().count();
    if length < config.short_threshold {
        return true;
    }

    let lowered = input.to_lowercase();
    for keyword in &config.keywords {
        if lowered.contains(&keyword.to_lowercase()) {
            return false;
        }
    }

    length < config.moderate_threshold
}

/// The planner's decision: which retrieval tools to run, with what
/// parameters. Immutable after [`RetrievalPlan::parse`].
///
/// `needs_direct_answer` is an override: when set, every other flag is
/// semantically ignored and no retrieval runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalPlan {
    pub needs_memo_search: bool,
    pub memo_search_query: String,

    pub needs_schedule_query: bool,
    pub schedule_range: String,

    pub needs_schedule_add: bool,
    pub schedule_add_params: String,

    pub needs_schedule_update: bool,
    pub schedule_update_params: String,

    pub needs_free_time: bool,
    pub free_time_date: String,

    pub needs_direct_answer: bool,
}

impl RetrievalPlan {
    /// Parse the planner output.
    ///
    /// If no line sets a flag, the default is decided exactly once, after
    /// parsing completes: casual input (per `casual`) answers directly;
    /// anything else falls back to a memo search using the raw planner
    /// output as the query.
    pub fn parse(response: &str, input: &str, casual: &CasualChatConfig) -> Self {
        let mut plan = RetrievalPlan::default();

        for raw_line in response.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "direct_answer" || (line.starts_with("PLAN:") && line.contains("direct_answer"))
            {
                plan.needs_direct_answer = true;
                continue;
            }

            if let Some(rest) = strip_directive(line, "memo_search:") {
                plan.needs_memo_search = true;
                plan.needs_direct_answer = false;
                plan.memo_search_query = rest.to_string();
            } else if let Some(rest) = strip_directive(line, "schedule_query:") {
                plan.needs_schedule_query = true;
                plan.needs_direct_answer = false;
                plan.schedule_range = rest.to_string();
            } else if let Some(rest) = strip_directive(line, "schedule_add:") {
                plan.needs_schedule_add = true;
                plan.needs_direct_answer = false;
                plan.schedule_add_params = rest.to_string();
            } else if let Some(rest) = strip_directive(line, "schedule_update:") {
                plan.needs_schedule_update = true;
                plan.needs_direct_answer = false;
                plan.schedule_update_params = rest.to_string();
            } else if let Some(rest) = strip_directive(line, "find_free_time:") {
                plan.needs_free_time = true;
                plan.needs_direct_answer = false;
                plan.free_time_date = rest.to_string();
            }
        }

        if !plan.any_retrieval() && !plan.needs_direct_answer {
            // Default decision, evaluated exactly once after parsing.
            if is_casual_chat(input, casual) {
                plan.needs_direct_answer = true;
            } else {
                plan.needs_memo_search = true;
                plan.memo_search_query = response.trim().to_string();
            }
        }

        plan
    }

    /// True when any retrieval flag is set
    pub fn any_retrieval(&self) -> bool {
        self.needs_memo_search
            || self.needs_schedule_query
            || self.needs_schedule_add
            || self.needs_schedule_update
            || self.needs_free_time
    }

    /// The retrieval requests this plan asks for, as
    /// (capability name, JSON tool input) pairs. Empty when
    /// `needs_direct_answer` is set.
    pub fn requests(&self) -> Vec<(&'static str, String)> {
        if self.needs_direct_answer {
            return Vec::new();
        }

        let mut requests = Vec::new();
        if self.needs_memo_search {
            requests.push((
                "memo_search",
                serde_json::json!({ "query": self.memo_search_query }).to_string(),
            ));
        }
        if self.needs_schedule_query {
            requests.push((
                "schedule_query",
                serde_json::json!({ "range": self.schedule_range }).to_string(),
            ));
        }
        if self.needs_schedule_add {
            requests.push(("schedule_add", self.schedule_add_params.clone()));
        }
        if self.needs_schedule_update {
            requests.push(("schedule_update", self.schedule_update_params.clone()));
        }
        if self.needs_free_time {
            requests.push((
                "find_free_time",
                serde_json::json!({ "date": self.free_time_date }).to_string(),
            ));
        }
        requests
    }
}

/// Match a `name: value` plan line case-insensitively on the directive
/// name, returning the trimmed value.
fn strip_directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let head = line.get(..directive.len())?;
    if head.eq_ignore_ascii_case(directive) {
        Some(line[directive.len()..].trim())
    } else {
        None
    }
}
