//! Tool trait — the abstraction over agent capabilities.
//!
//! A tool is a named, described, schema-bearing unit of capability the
//! agent may invoke during a step. Two variants exist: blocking [`Tool`]
//! and suspend-capable [`AsyncTool`]; [`AgentTool`] unifies them so the
//! registry dispatches either transparently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ToolError;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call id when one was given)
    pub id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    /// Create a tool call with a generated ID.
    pub fn new(
        tool_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// The result of executing a tool call.
///
/// `error = true` means the tool failed but the task continues; the
/// diagnostic content is handed back to the LLM like any other output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The call this result answers
    pub tool_call: ToolCall,

    /// The output content, or a diagnostic when `error` is set
    pub content: String,

    /// Whether the tool failed (non-fatal)
    pub error: bool,
}

/// A tool descriptor sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A blocking tool.
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool call, returning the output content.
    fn call(&self, tool_call: &ToolCall) -> std::result::Result<String, ToolError>;
}

/// A suspend-capable tool.
#[async_trait]
pub trait AsyncTool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool call, returning the output content.
    async fn call(&self, tool_call: &ToolCall) -> std::result::Result<String, ToolError>;
}

/// Either tool variant, dispatched transparently at call time.
#[derive(Clone)]
pub enum AgentTool {
    /// A blocking tool, run inline
    Blocking(Arc<dyn Tool>),
    /// A suspend-capable tool, awaited
    Suspending(Arc<dyn AsyncTool>),
}


impl AgentTool {
    /// The tool's unique name.
    pub fn name(&self) -> &str {
        match self {
            Self::Blocking(t) => t.name(),
            Self::Suspending(t) => t.name(),
        }
    }

    /// The tool's description.
    pub fn description(&self) -> &str {
        match self {
            Self::Blocking(t) => t.description(),
            Self::Suspending(t) => t.description(),
        }
    }

    /// JSON Schema for the tool's parameters.
    pub fn parameters_schema(&self) -> serde_json::Value {
        match self {
            Self::Blocking(t) => t.parameters_schema(),
            Self::Suspending(t) => t.parameters_schema(),
        }
    }

    /// Convert this tool into a descriptor for the LLM.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Execute a call against this tool, folding failure into a non-fatal
    /// [`ToolCallResult`].
    pub async fn execute(&self, tool_call: ToolCall) -> ToolCallResult {
        let outcome = match self {
            Self::Blocking(t) => t.call(&tool_call),
            Self::Suspending(t) => t.call(&tool_call).await,
        };
        match outcome {
            Ok(content) => ToolCallResult {
                tool_call,
                content,
                error: false,
            },
            Err(e) => ToolCallResult {
                content: e.to_string(),
                error: true,
                tool_call,
            },
        }
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Self::Blocking(_) => "Blocking",
            Self::Suspending(_) => "Suspending",
        };
        f.debug_struct("AgentTool")
            .field("variant", &variant)
            .field("name", &self.name())
            .finish()
    }
}

/// A registry of uniquely-named tools.
///
/// Names are unique at every observable instant: duplicate insertion
/// fails and retains nothing. Iteration order is insertion order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<AgentTool>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools)
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of tools.
    ///
    /// Fails if the list itself contains duplicate names; no tool from
    /// the list is retained in that case.
    pub fn from_tools(
        tools: impl IntoIterator<Item = AgentTool>,
    ) -> std::result::Result<Self, ToolError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.add(tool)?;
        }
        Ok(registry)
    }

    /// Register a tool. Fails if a tool of the same name already exists.
    pub fn add(&mut self, tool: AgentTool) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&AgentTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Insertion-ordered snapshot of the registered tools.
    pub fn list(&self) -> &[AgentTool] {
        &self.tools
    }

    /// Insertion-ordered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(AgentTool::name).collect()
    }

    /// Descriptors for every registered tool, for sending to the LLM.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(AgentTool::descriptor).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call.
    ///
    /// A name absent from the registry is a non-fatal per-call error: the
    /// result carries a diagnostic naming the missing tool.
    pub async fn execute(&self, tool_call: ToolCall) -> ToolCallResult {
        match self.get(&tool_call.tool_name) {
            Some(tool) => tool.execute(tool_call).await,
            None => ToolCallResult {
                content: ToolError::NotFound(tool_call.tool_name.clone()).to_string(),
                error: true,
                tool_call,
            },
        }
    }
}
