//! The agent — top-level orchestrator for task execution.
//!
//! An [`Agent`] owns the backbone LLM and the merged tool registry.
//! `run()` hands each task to its own [`TaskHandler`] and schedules the
//! drive loop as an independent tokio task, returning the handler
//! immediately so callers can await completion or inspect the partial
//! rollout.

use std::sync::Arc;

use tracing::{info, warn};

use taskloom_core::error::ToolError;
use taskloom_core::llm::Llm;
use taskloom_core::task::{Task, TaskStepResult};
use taskloom_core::tool::{AgentTool, ToolRegistry};

use crate::handler::{Plan, TaskHandler};
use crate::templates::AgentTemplates;

/// An LLM agent: a backbone LLM plus a set of uniquely-named tools.
#[derive(Debug)]
pub struct Agent {
    llm: Arc<dyn Llm>,
    tools: Arc<ToolRegistry>,
    templates: Arc<AgentTemplates>,
}

impl Agent {
    /// Create an agent with no tools.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            tools: Arc::new(ToolRegistry::new()),
            templates: Arc::new(AgentTemplates::default()),
        }
    }

    /// Create an agent with an initial tool set.
    ///
    /// Fails if the list contains duplicate tool names.
    pub fn with_tools(
        llm: Arc<dyn Llm>,
        tools: impl IntoIterator<Item = AgentTool>,
    ) -> std::result::Result<Self, ToolError> {
        Ok(Self {
            llm,
            tools: Arc::new(ToolRegistry::from_tools(tools)?),
            templates: Arc::new(AgentTemplates::default()),
        })
    }

    pub(crate) fn from_parts(
        llm: Arc<dyn Llm>,
        tools: ToolRegistry,
        templates: AgentTemplates,
    ) -> Self {
        Self {
            llm,
            tools: Arc::new(tools),
            templates: Arc::new(templates),
        }
    }

    /// Equip the agent with another tool. Fluent; fails on a duplicate
    /// name.
    ///
    /// Handlers already running keep the tool set they started with.
    pub fn add_tool(&mut self, tool: AgentTool) -> std::result::Result<&mut Self, ToolError> {
        Arc::make_mut(&mut self.tools).add(tool)?;
        Ok(self)
    }

    /// The agent's current tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run a task asynchronously.
    ///
    /// Returns the task's handler immediately; await
    /// [`TaskHandler::result`] for the terminal outcome.
    pub fn run(&self, task: Task) -> Arc<TaskHandler> {
        let handler = Arc::new(TaskHandler::new(
            task,
            Arc::clone(&self.llm),
            Arc::clone(&self.tools),
            Arc::clone(&self.templates),
        ));

        let driver = Arc::clone(&handler);
        let join = tokio::spawn(async move {
            drive(driver).await;
        });
        if let Err(e) = handler.set_background_task(join) {
            // Unreachable for a freshly created handler.
            warn!(error = %e, "Could not register the task's background task");
        }

        handler
    }
}

/// The drive loop for one task.
///
/// Every resolution path goes through the handler's completion handle;
/// nothing escapes into the scheduler.
async fn drive(handler: Arc<TaskHandler>) {
    info!(
        task = %handler.task().id,
        instruction = %handler.task().instruction,
        "Starting task"
    );

    let mut prev: Option<TaskStepResult> = None;
    while !handler.done() {
        match handler.get_next_step(prev.take()).await {
            Ok(Plan::Step(step)) => match handler.run_step(step).await {
                Ok(result) => prev = Some(result),
                Err(e) => {
                    warn!(task = %handler.task().id, error = %e, "Step execution failed");
                    handler.fail(e);
                }
            },
            Ok(Plan::Finish { content }) => {
                handler.finish(content).await;
                info!(task = %handler.task().id, "Task completed");
            }
            Err(e) => {
                warn!(task = %handler.task().id, error = %e, "Planning failed");
                handler.fail(e);
            }
        }
    }
}
