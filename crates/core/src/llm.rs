//! Llm trait — the abstraction over the backbone language model.
//!
//! The engine drives tasks through four operations: free-form completion,
//! chat with tools, schema-constrained structured output, and resuming a
//! conversation after tool results come back. Every backend (OpenAI-style
//! HTTP endpoints, local runtimes, test mocks) implements this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::tool::{ToolCall, ToolCallResult, ToolDescriptor};

/// The role of a message sender in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions (agent persona, rollout context)
    System,
    /// The instruction being executed
    User,
    /// The LLM's response
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single message in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: ChatRole,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a tool result message answering a specific tool call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// The result of a free-form completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    /// The assistant's text
    pub response: String,

    /// The raw, unparsed backend response
    pub full_response: String,
}

/// The core Llm trait.
///
/// All operations are suspend-capable and may fail with a backend-specific
/// error mapped into [`LlmError`].
#[async_trait]
pub trait Llm: Send + Sync + std::fmt::Debug {
    /// A human-readable name for this backend (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Complete a free-form prompt.
    async fn complete(&self, prompt: &str) -> std::result::Result<CompleteResult, LlmError>;

    /// Send a chat history (with the available tools) and get the
    /// assistant's next message, which may carry tool calls.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> std::result::Result<ChatMessage, LlmError>;

    /// Produce a value conforming to the given JSON schema.
    async fn structured_output(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, LlmError>;

    /// Resume a conversation after tool execution, giving the assistant
    /// the tool outputs in context. Returns the newly produced messages.
    async fn continue_with_tool_results(
        &self,
        results: &[ToolCallResult],
        history: &[ChatMessage],
    ) -> std::result::Result<Vec<ChatMessage>, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors() {
        let msg = ChatMessage::user("run the numbers");
        assert_eq!(msg.role, ChatRole::User);
        assert!(msg.tool_calls.is_empty());

        let tool = ChatMessage::tool_result("call_1", "42");
        assert_eq!(tool.role, ChatRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn chat_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn chat_message_roundtrip() {
        let msg = ChatMessage::assistant("done");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.role, ChatRole::Assistant);
        assert_eq!(parsed.content, "done");
    }
}
