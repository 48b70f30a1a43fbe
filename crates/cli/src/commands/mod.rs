//! CLI command implementations.

pub mod run;
pub mod tools;

use std::sync::Arc;

use anyhow::Context;

use taskloom_agent::{Agent, AgentBuilder};
use taskloom_config::{AppConfig, McpServerConfig};
use taskloom_core::provider::ToolProvider;
use taskloom_llms::OpenAiCompatLlm;
use taskloom_mcp::{McpToolProvider, StdioServerParams, StreamableHttpParams};

/// Build an agent from the loaded configuration.
///
/// Returns the providers alongside the agent so callers can close their
/// sessions once the work is done.
pub(crate) async fn build_agent(
    config: &AppConfig,
) -> anyhow::Result<(Agent, Vec<McpToolProvider>)> {
    let llm = OpenAiCompatLlm::new(
        config.llm.backend.clone(),
        config.llm.base_url.clone(),
        config.llm.api_key.clone().unwrap_or_default(),
        config.llm.model.clone(),
    )
    .context("failed to construct the LLM backend")?;

    let providers: Vec<McpToolProvider> = config
        .mcp_servers
        .iter()
        .map(mcp_provider)
        .collect::<anyhow::Result<_>>()?;

    let agent = AgentBuilder::new()
        .with_llm(Arc::new(llm))
        .with_tools(taskloom_tools::default_tools())
        .with_tool_providers(
            providers
                .iter()
                .map(|p| Arc::new(p.clone()) as Arc<dyn ToolProvider>),
        )
        .build()
        .await
        .context("failed to build the agent")?;

    Ok((agent, providers))
}

fn mcp_provider(server: &McpServerConfig) -> anyhow::Result<McpToolProvider> {
    let stdio = server.command.clone().map(|command| StdioServerParams {
        command,
        args: server.args.clone(),
        env: server.env.clone(),
    });
    let http = server.url.clone().map(|url| StreamableHttpParams {
        url,
        headers: server.headers.clone(),
    });
    McpToolProvider::new(server.name.clone(), stdio, http)
        .with_context(|| format!("invalid mcp server entry '{}'", server.name))
}

/// Close every provider session, releasing subprocesses and connections.
pub(crate) async fn close_providers(providers: &[McpToolProvider]) {
    for provider in providers {
        provider.close().await;
    }
}
