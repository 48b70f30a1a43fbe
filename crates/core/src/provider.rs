//! ToolProvider trait — an external source of tools.
//!
//! A provider owns a persistent session to a remote tool source and can
//! enumerate the tools it offers. The agent builder discovers tools from
//! all configured providers concurrently and merges them into one
//! registry, so provider implementations must namespace their tool names
//! to avoid cross-provider collisions.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::tool::AgentTool;

/// An external source of one or more tools, reachable over a persistent
/// session.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// The provider's identity, used to namespace its tools.
    fn name(&self) -> &str;

    /// Fetch the provider's tools, establishing the session if needed.
    async fn get_tools(&self) -> std::result::Result<Vec<AgentTool>, ProviderError>;
}
