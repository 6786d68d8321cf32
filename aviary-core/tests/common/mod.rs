//! Common test utilities shared across test files.
//!
//! Mock model, mock tools, and a recording event sink. Items here may not
//! be used by every test file, hence the module-level allow.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aviary_core::{
    CallUsage, ChatCompletion, EventError, EventSink, ExecEvent, LanguageModel, LlmError, Message,
    ToolCallRequest, ToolCapability, ToolChatResponse, ToolDescriptor, ToolError,
};
use serde_json::Value;

/// Install a test tracing subscriber once; respects `RUST_LOG`.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ===== Mock Language Model =====

enum Scripted {
    Text(String),
    ToolCalls {
        content: String,
        calls: Vec<(String, String)>,
    },
    Error(String),
}

/// A mock model that returns pre-programmed responses in order and counts
/// calls. `chat_stream` goes through the trait's default implementation,
/// so streamed responses count as `chat` calls too.
#[derive(Clone)]
pub struct MockLlm {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    chat_calls: Arc<AtomicU32>,
    tool_chat_calls: Arc<AtomicU32>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            chat_calls: Arc::new(AtomicU32::new(0)),
            tool_chat_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Queue a plain text response.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Text(text.into()));
        self
    }

    /// Queue a tool-calling response for `chat_with_tools`.
    pub fn with_tool_call(self, content: impl Into<String>, name: &str, args: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::ToolCalls {
                content: content.into(),
                calls: vec![(name.to_string(), args.to_string())],
            });
        self
    }

    /// Queue a model-side error.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Error(message.into()));
        self
    }

    pub fn chat_calls(&self) -> u32 {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn tool_chat_calls(&self) -> u32 {
        self.tool_chat_calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<Scripted, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Other("MockLlm: no more responses configured".to_string()))
    }

    fn usage() -> CallUsage {
        CallUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
        }
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn chat(&self, _messages: Vec<Message>) -> Result<ChatCompletion, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        match self.next()? {
            Scripted::Text(text) => Ok(ChatCompletion {
                text,
                usage: Self::usage(),
            }),
            Scripted::ToolCalls { .. } => Err(LlmError::Other(
                "MockLlm: tool-call response queued for plain chat".to_string(),
            )),
            Scripted::Error(message) => Err(LlmError::Model(message)),
        }
    }

    async fn chat_with_tools(
        &self,
        _messages: Vec<Message>,
        _tools: Vec<ToolDescriptor>,
    ) -> Result<ToolChatResponse, LlmError> {
        self.tool_chat_calls.fetch_add(1, Ordering::SeqCst);
        match self.next()? {
            Scripted::Text(text) => Ok(ToolChatResponse {
                content: text,
                tool_calls: vec![],
                usage: Self::usage(),
            }),
            Scripted::ToolCalls { content, calls } => Ok(ToolChatResponse {
                content,
                tool_calls: calls
                    .into_iter()
                    .map(|(name, arguments)| ToolCallRequest {
                        id: format!("call_{}", uuid::Uuid::new_v4()),
                        name,
                        arguments,
                    })
                    .collect(),
                usage: Self::usage(),
            }),
            Scripted::Error(message) => Err(LlmError::Model(message)),
        }
    }
}

// ===== Test Tools =====

/// Echoes the `message` field of its JSON input.
pub struct EchoTool;

#[async_trait]
impl ToolCapability for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the input back"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"message": {"type": "string"}},
            "required": ["message"]
        })
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let parsed: Value = serde_json::from_str(input).unwrap_or(Value::Null);
        match parsed.get("message").and_then(Value::as_str) {
            Some(message) => Ok(message.to_string()),
            None => Ok(input.to_string()),
        }
    }
}

/// Returns a fixed output and counts invocations.
pub struct StaticTool {
    name: &'static str,
    output: String,
    invocations: Arc<AtomicU32>,
}

impl StaticTool {
    pub fn new(name: &'static str, output: impl Into<String>) -> Self {
        Self {
            name,
            output: output.into(),
            invocations: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Handle to the invocation counter, usable after the tool is boxed.
    pub fn counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.invocations)
    }
}

#[async_trait]
impl ToolCapability for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed result"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn invoke(&self, _input: &str) -> Result<String, ToolError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Always fails.
pub struct FailingTool {
    name: &'static str,
}

impl FailingTool {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl ToolCapability for FailingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "A tool that always fails"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn invoke(&self, _input: &str) -> Result<String, ToolError> {
        Err(ToolError::Custom("tool backend unavailable".to_string()))
    }
}

/// Sleeps before answering; used to exercise timeouts and cancellation.
pub struct SleepTool {
    name: &'static str,
    delay: Duration,
}

impl SleepTool {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self { name, delay }
    }
}

#[async_trait]
impl ToolCapability for SleepTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Sleeps before answering"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn invoke(&self, _input: &str) -> Result<String, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok("slept".to_string())
    }
}

// ===== Recording Event Sink =====

/// Records every event and optionally fails on chosen event kinds.
#[derive(Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ExecEvent>>>,
    fail_on: Arc<Vec<&'static str>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            fail_on: Arc::new(Vec::new()),
        }
    }

    /// A sink that rejects events of the given kinds.
    pub fn failing_on(kinds: Vec<&'static str>) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            fail_on: Arc::new(kinds),
        }
    }

    pub fn events(&self) -> Vec<ExecEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(ExecEvent::kind).collect()
    }

    pub fn has(&self, kind: &str) -> bool {
        self.kinds().iter().any(|&k| k == kind)
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().iter().filter(|&&k| k == kind).count()
    }

    /// Concatenation of every streamed answer chunk.
    pub fn answer_text(&self) -> String {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ExecEvent::Answer { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ExecEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail_on.contains(&event.kind()) {
            return Err(EventError(format!("sink rejects {}", event.kind())));
        }
        Ok(())
    }
}
