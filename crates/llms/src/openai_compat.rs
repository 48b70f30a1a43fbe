//! OpenAI-compatible LLM backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama (`/v1`), vLLM, Together AI,
//! and any other endpoint exposing `/v1/chat/completions`.
//!
//! Supports chat with tool calling, free-form completion, and
//! JSON-object structured output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use taskloom_core::error::LlmError;
use taskloom_core::llm::{ChatMessage, ChatRole, CompleteResult, Llm};
use taskloom_core::tool::{ToolCall, ToolCallResult, ToolDescriptor};

/// An OpenAI-compatible LLM backend.
///
/// This covers the vast majority of hosted and local LLM runtimes since
/// most expose an OpenAI-compatible chat-completions endpoint.
#[derive(Debug)]
pub struct OpenAiCompatLlm {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatLlm {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> std::result::Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::NotConfigured(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// OpenAI convenience constructor.
    pub fn openai(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> std::result::Result<Self, LlmError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// OpenRouter convenience constructor.
    pub fn openrouter(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> std::result::Result<Self, LlmError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Ollama convenience constructor (no real key needed).
    pub fn ollama(
        base_url: Option<&str>,
        model: impl Into<String>,
    ) -> std::result::Result<Self, LlmError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
            model,
        )
    }

    /// Convert our chat messages to the wire format.
    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::User => "user".into(),
                    ChatRole::Assistant => "assistant".into(),
                    ChatRole::System => "system".into(),
                    ChatRole::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.tool_name.clone(),
                                    arguments: serde_json::Value::Object(tc.arguments.clone())
                                        .to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool descriptors to the wire format.
    fn to_api_tools(tools: &[ToolDescriptor]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Map a wire assistant message back into a [`ChatMessage`].
    fn from_api_message(message: ApiMessage) -> ChatMessage {
        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                tool_name: tc.function.name,
                arguments: serde_json::from_str::<serde_json::Value>(&tc.function.arguments)
                    .ok()
                    .and_then(|v| v.as_object().cloned())
                    .unwrap_or_default(),
            })
            .collect();

        ChatMessage {
            role: ChatRole::Assistant,
            content: message.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// POST a chat-completions body and parse the response, keeping the
    /// raw body around for callers that want it.
    async fn send(
        &self,
        body: serde_json::Value,
    ) -> std::result::Result<(ApiResponse, String), LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(backend = %self.name, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let raw = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if status != 200 {
            warn!(backend = %self.name, status, body = %raw, "LLM backend returned an error");
            return Err(LlmError::Api {
                status_code: status,
                message: raw,
            });
        }

        let parsed: ApiResponse = serde_json::from_str(&raw)
            .map_err(|e| LlmError::MalformedResponse(format!("failed to parse response: {e}")))?;
        Ok((parsed, raw))
    }

    fn first_choice(response: ApiResponse) -> std::result::Result<ApiMessage, LlmError> {
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::MalformedResponse("no choices in response".into()))
    }
}

#[async_trait]
impl Llm for OpenAiCompatLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<CompleteResult, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        let (response, raw) = self.send(body).await?;
        let message = Self::first_choice(response)?;
        Ok(CompleteResult {
            response: message.content.unwrap_or_default(),
            full_response: raw,
        })
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> std::result::Result<ChatMessage, LlmError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(messages),
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
        }

        let (response, _) = self.send(body).await?;
        Ok(Self::from_api_message(Self::first_choice(response)?))
    }

    async fn structured_output(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, LlmError> {
        let system = format!(
            "Answer with a single JSON object conforming to this JSON schema, \
             and nothing else:\n\n{schema}"
        );
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
        });

        let (response, _) = self.send(body).await?;
        let content = Self::first_choice(response)?.content.unwrap_or_default();
        extract_json_object(&content).ok_or_else(|| {
            LlmError::MalformedResponse(format!("no JSON object in response: {content}"))
        })
    }

    async fn continue_with_tool_results(
        &self,
        results: &[ToolCallResult],
        history: &[ChatMessage],
    ) -> std::result::Result<Vec<ChatMessage>, LlmError> {
        let mut api_messages = Self::to_api_messages(history);
        for result in results {
            api_messages.push(ApiMessage {
                role: "tool".into(),
                content: Some(result.content.clone()),
                tool_calls: None,
                tool_call_id: Some(result.tool_call.id.clone()),
            });
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": api_messages,
        });
        let (response, _) = self.send(body).await?;
        Ok(vec![Self::from_api_message(Self::first_choice(response)?)])
    }
}

/// Pull the first JSON object out of a model reply, tolerating prose or
/// code fences around it.
fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(&text[start..=end])
        .ok()
        .filter(serde_json::Value::is_object)
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_constructor() {
        let llm = OpenAiCompatLlm::openrouter("sk-test", "anthropic/claude-sonnet-4").unwrap();
        assert_eq!(llm.name(), "openrouter");
        assert!(llm.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let llm = OpenAiCompatLlm::ollama(None, "llama3.2").unwrap();
        assert_eq!(llm.name(), "ollama");
        assert!(llm.base_url.contains("localhost:11434"));
    }

    #[test]
    fn message_conversion_roles() {
        let messages = vec![
            ChatMessage::system("You are helpful"),
            ChatMessage::user("Hello"),
        ];
        let api = OpenAiCompatLlm::to_api_messages(&messages);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let mut message = ChatMessage::assistant("calling a tool");
        let mut arguments = serde_json::Map::new();
        arguments.insert("expression".into(), serde_json::json!("2+2"));
        message.tool_calls = vec![ToolCall {
            id: "call_1".into(),
            tool_name: "calculator".into(),
            arguments,
        }];

        let api = OpenAiCompatLlm::to_api_messages(&[message]);
        let tc = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "calculator");
        assert!(tc[0].function.arguments.contains("2+2"));
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn message_conversion_tool_response() {
        let message = ChatMessage::tool_result("call_1", "result data");
        let api = OpenAiCompatLlm::to_api_messages(&[message]);
        assert_eq!(api[0].role, "tool");
        assert_eq!(api[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_descriptor_conversion() {
        let tools = vec![ToolDescriptor {
            name: "adder".into(),
            description: "Add numbers".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api = OpenAiCompatLlm::to_api_tools(&tools);
        assert_eq!(api[0].function.name, "adder");
        assert_eq!(api[0].r#type, "function");
    }

    #[test]
    fn parse_response_with_tool_calls() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "adder", "arguments": "{\"a\": 1, \"b\": 2}"}
                    }]
                }
            }]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let message = OpenAiCompatLlm::from_api_message(
            OpenAiCompatLlm::first_choice(parsed).unwrap(),
        );
        assert_eq!(message.role, ChatRole::Assistant);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].tool_name, "adder");
        assert_eq!(message.tool_calls[0].arguments["a"], 1);
    }

    #[test]
    fn malformed_tool_arguments_fold_to_empty() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "adder", "arguments": "not json"}
                    }]
                }
            }]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let message = OpenAiCompatLlm::from_api_message(
            OpenAiCompatLlm::first_choice(parsed).unwrap(),
        );
        assert!(message.tool_calls[0].arguments.is_empty());
    }

    #[test]
    fn extract_json_object_plain() {
        let value = extract_json_object(r#"{"instruction": "go", "last_step": false}"#).unwrap();
        assert_eq!(value["instruction"], "go");
    }

    #[test]
    fn extract_json_object_fenced() {
        let text = "Here is the step:\n```json\n{\"instruction\": \"go\", \"last_step\": true}\n```";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["last_step"], true);
    }

    #[test]
    fn extract_json_object_rejects_non_objects() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("no json here").is_none());
    }
}
