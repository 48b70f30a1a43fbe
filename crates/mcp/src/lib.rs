//! MCP integration for taskloom.
//!
//! An [`McpToolProvider`] owns one persistent session to an MCP server
//! (subprocess stdio or streamable HTTP), established lazily and shared
//! by every tool discovered from it. Discovered tools implement the core
//! `AsyncTool` trait and dispatch their calls over the session.

pub mod provider;
pub mod session;
pub mod tool;

pub use provider::{McpToolProvider, SessionPhase};
pub use session::{
    McpCallResult, McpChannel, McpSession, McpToolDef, StdioServerParams, StreamableHttpParams,
};
pub use tool::McpTool;
