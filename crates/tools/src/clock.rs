//! Clock tool — tells the agent what time it is.

use chrono::Utc;

use taskloom_core::error::ToolError;
use taskloom_core::tool::{Tool, ToolCall};

pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC (RFC 3339)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn call(&self, _tool_call: &ToolCall) -> std::result::Result<String, ToolError> {
        Ok(Utc::now().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_a_parseable_timestamp() {
        let output = CurrentTimeTool
            .call(&ToolCall::new("current_time", serde_json::Map::new()))
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&output).is_ok());
    }
}
