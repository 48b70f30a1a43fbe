//! Built-in tools and adapters for taskloom.
//!
//! [`FunctionTool`] and [`AsyncFunctionTool`] turn plain closures into
//! tools; `default_tools()` returns the small built-in set.

pub mod clock;
pub mod function;

use std::sync::Arc;

use taskloom_core::tool::AgentTool;

pub use clock::CurrentTimeTool;
pub use function::{AsyncFunctionTool, FunctionTool};

/// The built-in tool set.
pub fn default_tools() -> Vec<AgentTool> {
    vec![AgentTool::Blocking(Arc::new(CurrentTimeTool))]
}
