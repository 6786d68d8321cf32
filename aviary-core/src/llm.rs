//! The language-model capability consumed by execution strategies
//!
//! This module contains the [`LanguageModel`] trait and the types it
//! exchanges. Concrete backends live outside this crate; strategies only
//! ever see the trait object.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCallRequest, ToolDescriptor};

/// Per-call token statistics reported by a model backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

/// Result of a single-shot chat call
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// Generated text
    pub text: String,
    /// Token statistics for this call
    pub usage: CallUsage,
}

/// Result of a tool-augmented chat call
///
/// The model may return text content, structured tool calls, or both.
/// An empty `tool_calls` list with non-empty `content` is a final answer.
#[derive(Debug, Clone)]
pub struct ToolChatResponse {
    /// Text content, possibly empty when the model only requests tools
    pub content: String,
    /// Structured tool calls, in the order the model issued them
    pub tool_calls: Vec<ToolCallRequest>,
    /// Token statistics for this call
    pub usage: CallUsage,
}

/// Events from streaming chat responses
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text delta
    TextDelta(String),
    /// Stream finished
    Completed {
        /// Token usage for the whole response (if the backend reports it)
        usage: Option<CallUsage>,
    },
}

/// Errors from a model backend
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Authentication or authorization failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting or throttling
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network or connectivity issues
    #[error("network error: {0}")]
    Network(String),

    /// Model-side errors (content filtered, context too long, malformed output)
    #[error("model error: {0}")]
    Model(String),

    /// Other backend-specific errors
    #[error("{0}")]
    Other(String),
}

/// The model capability consumed by every execution strategy
///
/// Three operations: single-shot chat, streaming chat, and tool-augmented
/// chat. `chat_stream` has a default implementation in terms of `chat`, so
/// backends without native streaming still satisfy the contract - the
/// full response arrives as a single delta.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single-shot chat over role-tagged messages
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatCompletion, LlmError>;

    /// Tool-augmented chat: the model may answer directly or request tool calls
    async fn chat_with_tools(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDescriptor>,
    ) -> Result<ToolChatResponse, LlmError>;

    /// Streaming chat, delivering text deltas as they are generated
    async fn chat_stream(
        &self,
        messages: Vec<Message>,
    ) -> Result<BoxStream<'static, Result<StreamEvent, LlmError>>, LlmError> {
        // Default implementation: call chat and replay the complete response
        let completion = self.chat(messages).await?;

        let mut events = Vec::new();
        if !completion.text.is_empty() {
            events.push(Ok(StreamEvent::TextDelta(completion.text)));
        }
        events.push(Ok(StreamEvent::Completed {
            usage: Some(completion.usage),
        }));

        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct CannedModel;

    #[async_trait::async_trait]
    impl LanguageModel for CannedModel {
        async fn chat(&self, _messages: Vec<Message>) -> Result<ChatCompletion, LlmError> {
            Ok(ChatCompletion {
                text: "canned".to_string(),
                usage: CallUsage {
                    prompt_tokens: 3,
                    completion_tokens: 1,
                    total_tokens: 4,
                    ..Default::default()
                },
            })
        }

        async fn chat_with_tools(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDescriptor>,
        ) -> Result<ToolChatResponse, LlmError> {
            Ok(ToolChatResponse {
                content: "canned".to_string(),
                tool_calls: vec![],
                usage: CallUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_default_chat_stream_replays_chat() {
        let model = CannedModel;
        let mut stream = model.chat_stream(vec![Message::user("hi")]).await.unwrap();

        let mut content = String::new();
        let mut usage = None;
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                StreamEvent::TextDelta(delta) => content.push_str(&delta),
                StreamEvent::Completed { usage: u } => usage = u,
            }
        }

        assert_eq!(content, "canned");
        assert_eq!(usage.unwrap().total_tokens, 4);
    }
}
