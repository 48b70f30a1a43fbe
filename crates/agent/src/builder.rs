//! AgentBuilder — fluent assembly of an agent.
//!
//! Collects the LLM, local tools, tool providers, and templates, then
//! `build()` discovers provider tools (all providers in flight at once)
//! and merges everything into one registry.

use std::sync::Arc;

use futures::future;
use tracing::debug;

use taskloom_core::error::AgentError;
use taskloom_core::llm::Llm;
use taskloom_core::provider::ToolProvider;
use taskloom_core::tool::{AgentTool, ToolRegistry};

use crate::agent::Agent;
use crate::templates::AgentTemplates;

/// A builder for [`Agent`]s.
#[derive(Default)]
pub struct AgentBuilder {
    llm: Option<Arc<dyn Llm>>,
    tools: Vec<AgentTool>,
    providers: Vec<Arc<dyn ToolProvider>>,
    templates: AgentTemplates,
}

impl AgentBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backbone LLM.
    pub fn with_llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Add a local tool.
    pub fn with_tool(mut self, tool: AgentTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add local tools.
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = AgentTool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Add a tool provider to discover tools from.
    pub fn with_tool_provider(mut self, provider: Arc<dyn ToolProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Add tool providers.
    pub fn with_tool_providers(
        mut self,
        providers: impl IntoIterator<Item = Arc<dyn ToolProvider>>,
    ) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Replace the default templates.
    pub fn with_templates(mut self, templates: AgentTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Build the agent.
    ///
    /// Discovers tools from every registered provider concurrently —
    /// one discovery call per provider, all in flight simultaneously —
    /// and merges the results with the manually added tools. Fails with
    /// [`AgentError::MissingLlm`] when no LLM was configured, and with a
    /// duplicate-name error when the merged tool set collides.
    pub async fn build(self) -> std::result::Result<Agent, AgentError> {
        let llm = self.llm.ok_or(AgentError::MissingLlm)?;

        let discovered =
            future::try_join_all(self.providers.iter().map(|p| p.get_tools())).await?;

        let mut registry = ToolRegistry::from_tools(self.tools)?;
        for tool in discovered.into_iter().flatten() {
            debug!(tool = tool.name(), "Registering discovered tool");
            registry.add(tool)?;
        }

        Ok(Agent::from_parts(llm, registry, self.templates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use taskloom_core::error::{LlmError, ProviderError, ToolError};
    use taskloom_core::llm::{ChatMessage, CompleteResult};
    use taskloom_core::tool::{Tool, ToolCall, ToolCallResult, ToolDescriptor};

    #[derive(Debug)]
    struct NullLlm;

    #[async_trait]
    impl Llm for NullLlm {
        fn name(&self) -> &str {
            "null"
        }
        async fn complete(&self, _prompt: &str) -> Result<CompleteResult, LlmError> {
            Err(LlmError::NotConfigured("null".into()))
        }
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDescriptor],
        ) -> Result<ChatMessage, LlmError> {
            Err(LlmError::NotConfigured("null".into()))
        }
        async fn structured_output(
            &self,
            _prompt: &str,
            _schema: &serde_json::Value,
        ) -> Result<serde_json::Value, LlmError> {
            Err(LlmError::NotConfigured("null".into()))
        }
        async fn continue_with_tool_results(
            &self,
            _results: &[ToolCallResult],
            _history: &[ChatMessage],
        ) -> Result<Vec<ChatMessage>, LlmError> {
            Err(LlmError::NotConfigured("null".into()))
        }
    }

    struct NamedTool(String);

    impl Tool for NamedTool {
        fn name(&self) -> &str {
            &self.0
        }
        fn description(&self) -> &str {
            "a named tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn call(&self, _tool_call: &ToolCall) -> Result<String, ToolError> {
            Ok("ok".into())
        }
    }

    /// A provider exposing one tool named `fetch`, namespaced like a real
    /// remote provider would.
    struct FetchProvider {
        name: String,
        delay: Duration,
    }

    #[async_trait]
    impl ToolProvider for FetchProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn get_tools(&self) -> Result<Vec<AgentTool>, ProviderError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![AgentTool::Blocking(Arc::new(NamedTool(format!(
                "mcp__{}__fetch",
                self.name
            ))))])
        }
    }

    #[tokio::test]
    async fn build_requires_an_llm() {
        let err = AgentBuilder::new().build().await.unwrap_err();
        assert!(matches!(err, AgentError::MissingLlm));
    }

    #[tokio::test]
    async fn same_remote_tool_name_from_two_providers_does_not_collide() {
        let agent = AgentBuilder::new()
            .with_llm(Arc::new(NullLlm))
            .with_tool_providers([
                Arc::new(FetchProvider {
                    name: "alpha".into(),
                    delay: Duration::ZERO,
                }) as Arc<dyn ToolProvider>,
                Arc::new(FetchProvider {
                    name: "beta".into(),
                    delay: Duration::ZERO,
                }),
            ])
            .build()
            .await
            .unwrap();

        let names = agent.tools().names();
        assert_eq!(names, vec!["mcp__alpha__fetch", "mcp__beta__fetch"]);
    }

    #[tokio::test]
    async fn discovered_tools_merge_after_manual_ones() {
        let agent = AgentBuilder::new()
            .with_llm(Arc::new(NullLlm))
            .with_tool(AgentTool::Blocking(Arc::new(NamedTool("local".into()))))
            .with_tool_provider(Arc::new(FetchProvider {
                name: "remote".into(),
                delay: Duration::ZERO,
            }))
            .build()
            .await
            .unwrap();

        assert_eq!(agent.tools().names(), vec!["local", "mcp__remote__fetch"]);
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_runs_all_providers_concurrently() {
        let start = tokio::time::Instant::now();
        let _agent = AgentBuilder::new()
            .with_llm(Arc::new(NullLlm))
            .with_tool_providers((0..4).map(|i| {
                Arc::new(FetchProvider {
                    name: format!("p{i}"),
                    delay: Duration::from_millis(50),
                }) as Arc<dyn ToolProvider>
            }))
            .build()
            .await
            .unwrap();

        // One discovery call per provider, all in flight at once: virtual
        // elapsed time is one delay, not four.
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }
}
