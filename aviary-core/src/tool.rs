//! The tool capability consumed by execution strategies
//!
//! Tools are external collaborators (search, scheduling, etc.). The core
//! treats them uniformly through [`ToolCapability`]: inputs and outputs
//! are opaque JSON-encoded strings by convention, and the core never
//! inspects their shape beyond the input-summary heuristic used for
//! telemetry events.

use std::sync::Arc;

use serde_json::Value;

/// Errors that can occur during tool execution
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Custom(String),
}

impl From<String> for ToolError {
    fn from(s: String) -> Self {
        Self::Custom(s)
    }
}

impl From<&str> for ToolError {
    fn from(s: &str) -> Self {
        Self::Custom(s.to_string())
    }
}

/// Contract implemented by every tool the core can drive
///
/// `invoke` takes a JSON-encoded input string and returns a JSON-encoded
/// (or plain-text) output string. Implementations must be cancellation
/// safe: the caller may drop the invoke future at any point.
#[async_trait::async_trait]
pub trait ToolCapability: Send + Sync {
    /// The name of the tool (e.g. "memo_search", "schedule_query")
    fn name(&self) -> &str;

    /// A description of what the tool does
    fn description(&self) -> &str;

    /// JSON-schema-shaped parameter object for this tool's input
    fn parameters(&self) -> Value;

    /// Execute the tool with an opaque JSON input string
    async fn invoke(&self, input: &str) -> Result<String, ToolError>;
}

/// Find a tool by name in a capability set
pub fn find_tool<'a>(
    tools: &'a [Arc<dyn ToolCapability>],
    name: &str,
) -> Option<&'a Arc<dyn ToolCapability>> {
    tools.iter().find(|t| t.name() == name)
}
