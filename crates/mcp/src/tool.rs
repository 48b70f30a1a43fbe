//! McpTool — a remote tool proxied through its provider's session.

use async_trait::async_trait;
use serde_json::Value;

use taskloom_core::error::ToolError;
use taskloom_core::tool::{AsyncTool, ToolCall};

use crate::provider::McpToolProvider;
use crate::session::McpToolDef;

/// A tool served by an MCP server.
///
/// The public name is namespaced `mcp__{provider}__{tool}` so tools from
/// different providers never collide in one registry; calls go out with
/// the server's own name.
pub struct McpTool {
    provider: McpToolProvider,
    name: String,
    remote_name: String,
    description: String,
    input_schema: Value,
}

impl McpTool {
    pub(crate) fn new(provider: McpToolProvider, def: McpToolDef) -> Self {
        let name = format!("mcp__{}__{}", provider.name(), def.name);
        Self {
            provider,
            name,
            remote_name: def.name,
            description: def.description,
            input_schema: def.input_schema,
        }
    }
}

#[async_trait]
impl AsyncTool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        if self.input_schema.is_null() {
            serde_json::json!({"type": "object"})
        } else {
            self.input_schema.clone()
        }
    }

    async fn call(&self, tool_call: &ToolCall) -> std::result::Result<String, ToolError> {
        let session = self.provider.session().await.map_err(|e| {
            ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let result = session
            .call_tool(
                &self.remote_name,
                Value::Object(tool_call.arguments.clone()),
            )
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: e.to_string(),
            })?;

        if result.is_error {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: result.content,
            });
        }
        Ok(result.content)
    }
}
