//! `taskloom run` — execute one task and print its result.

use anyhow::Context;
use tracing::info;

use taskloom_config::AppConfig;
use taskloom_core::task::Task;

use super::{build_agent, close_providers};

pub async fn execute(instruction: String, show_rollout: bool) -> anyhow::Result<()> {
    let config = AppConfig::load(None)?;
    config.validate()?;

    let (agent, providers) = build_agent(&config).await?;
    info!(tools = agent.tools().len(), "Agent ready");

    let handler = agent.run(Task::new(instruction));
    let outcome = handler.result().await;
    close_providers(&providers).await;

    let result = outcome.context("task failed")?;
    println!("{}", result.content);
    if show_rollout || config.agent.show_rollout {
        eprintln!("--- rollout ---");
        eprintln!("{}", result.rollout);
    }
    Ok(())
}
