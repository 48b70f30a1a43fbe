//! `taskloom tools` — list the tools the agent would carry.

use taskloom_config::AppConfig;

use super::{build_agent, close_providers};

pub async fn execute() -> anyhow::Result<()> {
    let config = AppConfig::load(None)?;
    config.validate()?;

    let (agent, providers) = build_agent(&config).await?;

    for tool in agent.tools().list() {
        println!("{:<32} {}", tool.name(), tool.description());
    }
    if agent.tools().is_empty() {
        println!("(no tools configured)");
    }

    close_providers(&providers).await;
    Ok(())
}
