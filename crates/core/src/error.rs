//! Error types for the taskloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all taskloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM errors ---
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Tool provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- MCP errors ---
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    // --- Handler lifecycle errors ---
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    // --- Task execution errors ---
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    // --- Agent construction errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the backbone LLM. `Clone` because they travel through
/// completion handles that hand the same terminal error to every caller.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("LLM not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool with name {0} already registered")]
    DuplicateName(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors from an external tool provider (session acquisition, discovery).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Failed to connect to provider {provider}: {reason}")]
    Connection { provider: String, reason: String },

    #[error("Protocol error from provider {provider}: {reason}")]
    Protocol { provider: String, reason: String },

    #[error("Provider {0} has no ready session")]
    NotReady(String),
}

/// Errors from the MCP session layer.
#[derive(Debug, Clone, Error)]
pub enum McpError {
    #[error(
        "At least one of stdio params or a streamable HTTP URL is required to reach an MCP server"
    )]
    MissingServerParams,

    #[error("Failed to spawn MCP server process: {0}")]
    Spawn(String),

    #[error("MCP connection error: {0}")]
    Connection(String),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP session closed")]
    Closed,
}

/// Programming-contract violations on a `TaskHandler`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("No background task has been registered on this handler")]
    NoBackgroundTask,

    #[error("A background task has already been registered on this handler")]
    BackgroundTaskAlreadySet,
}

/// Terminal failures of a running task, delivered through the completion
/// handle. `Clone` for the same reason as [`LlmError`].
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Step execution failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Handler contract violated: {0}")]
    Handler(String),
}

/// Errors raised when constructing an agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("An LLM must be configured before building an agent")]
    MissingLlm,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_displays_correctly() {
        let err = Error::Llm(LlmError::Api {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn duplicate_tool_error_names_the_tool() {
        let err = Error::Tool(ToolError::DuplicateName("fetch".into()));
        assert!(err.to_string().contains("fetch"));
    }

    #[test]
    fn planning_error_carries_source_message() {
        let source = LlmError::Network("connection refused".into());
        let err = TaskError::Planning(source.to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn task_error_is_cloneable() {
        let err = TaskError::Planning("no step produced".into());
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
