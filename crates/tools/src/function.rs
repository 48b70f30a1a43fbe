//! Function tools — turn a closure into a tool.

use futures::future::BoxFuture;

use async_trait::async_trait;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{AsyncTool, Tool, ToolCall};

/// A blocking closure exposed as a tool.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: serde_json::Value,
    func: Box<dyn Fn(&ToolCall) -> std::result::Result<String, ToolError> + Send + Sync>,
}

impl FunctionTool {
    /// Create a tool from a blocking closure.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: serde_json::Value,
        func: impl Fn(&ToolCall) -> std::result::Result<String, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            func: Box::new(func),
        }
    }
}

impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.parameters_schema.clone()
    }

    fn call(&self, tool_call: &ToolCall) -> std::result::Result<String, ToolError> {
        (self.func)(tool_call)
    }
}

/// A suspend-capable closure exposed as a tool.
pub struct AsyncFunctionTool {
    name: String,
    description: String,
    parameters_schema: serde_json::Value,
    func: Box<
        dyn Fn(ToolCall) -> BoxFuture<'static, std::result::Result<String, ToolError>>
            + Send
            + Sync,
    >,
}

impl AsyncFunctionTool {
    /// Create a tool from a future-returning closure.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: serde_json::Value,
        func: impl Fn(ToolCall) -> BoxFuture<'static, std::result::Result<String, ToolError>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl AsyncTool for AsyncFunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.parameters_schema.clone()
    }

    async fn call(&self, tool_call: &ToolCall) -> std::result::Result<String, ToolError> {
        (self.func)(tool_call.clone()).await
    }
}
