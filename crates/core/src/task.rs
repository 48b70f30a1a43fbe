//! Task domain types.
//!
//! A [`Task`] is one natural-language instruction handed to the agent.
//! Execution decomposes it into [`TaskStep`]s, each producing a
//! [`TaskStepResult`], until a step flagged `last_step` finalizes the
//! whole task into a [`TaskResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work for the agent. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: String,

    /// The natural-language instruction to carry out
    pub instruction: String,

    /// When this task was created
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task from an instruction.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            instruction: instruction.into(),
            created_at: Utc::now(),
        }
    }
}

/// One planning increment: the next instruction for the agent to execute.
///
/// `last_step` signals termination intent — after the step carrying it
/// executes, no further steps are requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStep {
    /// The instruction for this step
    pub instruction: String,

    /// Whether completing this step completes the task
    pub last_step: bool,
}

impl TaskStep {
    /// JSON schema the planner's structured output must conform to.
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": "The next instruction for the assistant to execute"
                },
                "last_step": {
                    "type": "boolean",
                    "description": "True when the task is complete and no further steps are needed"
                }
            },
            "required": ["instruction", "last_step"]
        })
    }
}

/// The outcome of executing one [`TaskStep`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStepResult {
    /// The step that was executed
    pub task_step: TaskStep,

    /// The assistant's final content for this step, if any
    pub content: Option<String>,

    /// Mirrors the executed step's `last_step` flag
    pub last_step: bool,
}

/// The terminal payload of a task, delivered once through the handler's
/// completion handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The task this result belongs to
    pub task: Task,

    /// The final response content
    pub content: String,

    /// The accumulated rollout trace, one contribution per line
    pub rollout: String,

    /// Whether the task finished abnormally
    pub error: bool,
}
