//! TaskHandler — the per-task state machine.
//!
//! One handler drives one task: it decides the next step, executes it,
//! accumulates the rollout trace, and exposes a completion handle the
//! caller awaits. The rollout and the single background-task slot are
//! the only shared mutable state; each is guarded by its own lock, held
//! only for the mutation and never across an external call.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use taskloom_core::error::{HandlerError, TaskError};
use taskloom_core::llm::{ChatMessage, ChatRole, Llm};
use taskloom_core::task::{Task, TaskResult, TaskStep, TaskStepResult};
use taskloom_core::tool::ToolRegistry;

use crate::templates::{AgentTemplates, render};

/// Where a handler is in its life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandlerState {
    #[default]
    Created,
    Running,
    Done,
    Failed,
}

/// What planning yields: another step to run, or the terminal signal.
#[derive(Debug, Clone)]
pub enum Plan {
    Step(TaskStep),
    Finish { content: String },
}

type Outcome = std::result::Result<TaskResult, TaskError>;

/// The state machine driving one [`Task`] to completion.
pub struct TaskHandler {
    task: Task,
    llm: Arc<dyn Llm>,
    tools: Arc<ToolRegistry>,
    templates: Arc<AgentTemplates>,

    /// Append-only trace of the agent's actions; the single
    /// authoritative copy.
    rollout: Mutex<Vec<String>>,

    state: StdMutex<HandlerState>,
    background: StdMutex<Option<JoinHandle<()>>>,

    outcome_tx: watch::Sender<Option<Outcome>>,
    outcome_rx: watch::Receiver<Option<Outcome>>,
}

impl TaskHandler {
    /// Create a handler for a task. The handler starts in
    /// [`HandlerState::Created`] until a background task is registered.
    pub fn new(
        task: Task,
        llm: Arc<dyn Llm>,
        tools: Arc<ToolRegistry>,
        templates: Arc<AgentTemplates>,
    ) -> Self {
        let (outcome_tx, outcome_rx) = watch::channel(None);
        Self {
            task,
            llm,
            tools,
            templates,
            rollout: Mutex::new(Vec::new()),
            state: StdMutex::new(HandlerState::Created),
            background: StdMutex::new(None),
            outcome_tx,
            outcome_rx,
        }
    }

    /// The task this handler drives.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The handler's current state.
    pub fn state(&self) -> HandlerState {
        *self.state.lock().expect("handler state lock poisoned")
    }

    /// Register the background task driving this handler.
    ///
    /// A handler accepts exactly one for its entire life; a second
    /// registration is a contract violation.
    pub fn set_background_task(
        &self,
        handle: JoinHandle<()>,
    ) -> std::result::Result<(), HandlerError> {
        let mut slot = self.background.lock().expect("background slot lock poisoned");
        if slot.is_some() {
            return Err(HandlerError::BackgroundTaskAlreadySet);
        }
        *slot = Some(handle);
        *self.state.lock().expect("handler state lock poisoned") = HandlerState::Running;
        Ok(())
    }

    /// A handle onto the registered background task.
    pub fn background_task(&self) -> std::result::Result<AbortHandle, HandlerError> {
        self.background
            .lock()
            .expect("background slot lock poisoned")
            .as_ref()
            .map(JoinHandle::abort_handle)
            .ok_or(HandlerError::NoBackgroundTask)
    }

    /// Snapshot of the rollout entries appended so far.
    pub async fn rollout(&self) -> Vec<String> {
        self.rollout.lock().await.clone()
    }

    /// Decide what to do next, given the previous step's result.
    ///
    /// The first step always echoes the task's instruction verbatim.
    /// A previous result flagged `last_step` is the terminal signal.
    /// Otherwise the planner is consulted for a structured [`TaskStep`];
    /// any failure there surfaces as [`TaskError::Planning`].
    pub async fn get_next_step(
        &self,
        prev: Option<TaskStepResult>,
    ) -> std::result::Result<Plan, TaskError> {
        if let Some(prev) = &prev {
            if prev.last_step {
                return Ok(Plan::Finish {
                    content: prev.content.clone().unwrap_or_default(),
                });
            }
        }

        let snapshot = { self.rollout.lock().await.clone() };
        if snapshot.is_empty() {
            debug!(task = %self.task.id, "First step echoes the task instruction");
            return Ok(Plan::Step(TaskStep {
                instruction: self.task.instruction.clone(),
                last_step: false,
            }));
        }

        let current_response = prev
            .as_ref()
            .and_then(|r| r.content.clone())
            .unwrap_or_default();
        let prompt = render(
            &self.templates.next_step_prompt,
            &[
                ("instruction", self.task.instruction.as_str()),
                ("current_response", current_response.as_str()),
                ("current_rollout", snapshot.join("\n").as_str()),
            ],
        );

        let value = self
            .llm
            .structured_output(&prompt, &TaskStep::json_schema())
            .await
            .map_err(|e| TaskError::Planning(e.to_string()))?;
        let step: TaskStep = serde_json::from_value(value)
            .map_err(|e| TaskError::Planning(format!("planner returned a malformed step: {e}")))?;
        Ok(Plan::Step(step))
    }

    /// Execute one step: chat with tools, dispatch any requested tool
    /// calls, let the LLM continue with the results, and append every
    /// contribution to the rollout in chronological order.
    pub async fn run_step(
        &self,
        step: TaskStep,
    ) -> std::result::Result<TaskStepResult, TaskError> {
        let snapshot = { self.rollout.lock().await.clone() };
        let system = if snapshot.is_empty() {
            self.templates.system_message.clone()
        } else {
            render(
                &self.templates.step_system_message,
                &[
                    ("system_message", self.templates.system_message.as_str()),
                    ("current_rollout", snapshot.join("\n").as_str()),
                ],
            )
        };

        let mut history = vec![
            ChatMessage::system(system),
            ChatMessage::user(&step.instruction),
        ];
        let descriptors = self.tools.descriptors();
        let response = self.llm.chat(&history, &descriptors).await?;

        {
            let mut rollout = self.rollout.lock().await;
            rollout.push(render(
                &self.templates.instruction_contribution,
                &[("instruction", step.instruction.as_str())],
            ));
            self.push_chat_contribution(&mut rollout, &response);
        }

        let mut content = non_empty(&response.content);

        if !response.tool_calls.is_empty() {
            let calls = response.tool_calls.clone();
            {
                let called = calls
                    .iter()
                    .map(|c| {
                        format!(
                            "{}({})",
                            c.tool_name,
                            serde_json::Value::Object(c.arguments.clone())
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut rollout = self.rollout.lock().await;
                rollout.push(render(
                    &self.templates.tool_call_contribution,
                    &[("called_tools", called.as_str())],
                ));
            }
            history.push(response);

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                debug!(task = %self.task.id, tool = %call.tool_name, "Dispatching tool call");
                let result = self.tools.execute(call).await;
                {
                    let mut rollout = self.rollout.lock().await;
                    rollout.push(render(
                        &self.templates.chat_contribution,
                        &[("actor", "tool"), ("content", result.content.as_str())],
                    ));
                }
                results.push(result);
            }
            for result in &results {
                history.push(ChatMessage::tool_result(
                    result.tool_call.id.clone(),
                    result.content.clone(),
                ));
            }

            let follow_ups = self
                .llm
                .continue_with_tool_results(&results, &history)
                .await?;
            {
                let mut rollout = self.rollout.lock().await;
                for message in &follow_ups {
                    self.push_chat_contribution(&mut rollout, message);
                }
            }
            if let Some(last) = follow_ups
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::Assistant)
            {
                if let Some(text) = non_empty(&last.content) {
                    content = Some(text);
                }
            }
        }

        Ok(TaskStepResult {
            last_step: step.last_step,
            task_step: step,
            content,
        })
    }

    /// Record a chat message in the rollout. Only assistant and tool
    /// lines are kept; user/system framing is protocol, not agent action.
    fn push_chat_contribution(&self, rollout: &mut Vec<String>, message: &ChatMessage) {
        let actor = match message.role {
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
            ChatRole::User | ChatRole::System => return,
        };
        if message.content.is_empty() {
            return;
        }
        rollout.push(render(
            &self.templates.chat_contribution,
            &[("actor", actor), ("content", message.content.as_str())],
        ));
    }

    /// Whether the completion handle has been resolved.
    pub fn done(&self) -> bool {
        self.outcome_rx.borrow().is_some()
    }

    /// The terminal error, if the task failed.
    pub fn error(&self) -> Option<TaskError> {
        match &*self.outcome_rx.borrow() {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Wait for the task to resolve and return its terminal outcome.
    pub async fn result(&self) -> std::result::Result<TaskResult, TaskError> {
        let mut rx = self.outcome_rx.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err(TaskError::Handler(
                    "handler dropped before resolving".into(),
                ));
            }
        }
    }

    /// Finalize the task with the accumulated rollout.
    pub(crate) async fn finish(&self, content: String) {
        let rollout = self.rollout.lock().await.join("\n");
        self.resolve(Ok(TaskResult {
            task: self.task.clone(),
            content,
            rollout,
            error: false,
        }));
    }

    /// Resolve the completion handle with a terminal failure.
    pub(crate) fn fail(&self, error: TaskError) {
        self.resolve(Err(error));
    }

    fn resolve(&self, outcome: Outcome) {
        {
            let mut state = self.state.lock().expect("handler state lock poisoned");
            *state = match &outcome {
                Ok(_) => HandlerState::Done,
                Err(_) => HandlerState::Failed,
            };
        }
        // Deliver at most once; a second resolution loses.
        self.outcome_tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome);
                true
            } else {
                false
            }
        });
    }
}

fn non_empty(content: &str) -> Option<String> {
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}
