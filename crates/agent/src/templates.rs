//! Prompt and rollout-contribution templates.
//!
//! Plain strings with `{placeholder}` slots, substituted by [`render`].
//! Callers can swap any of them through the builder; the defaults keep
//! the agent self-contained.

/// The template set one agent carries.
#[derive(Debug, Clone)]
pub struct AgentTemplates {
    /// Base system message for every step. No placeholders.
    pub system_message: String,

    /// Planning prompt deciding the next step. Placeholders:
    /// `{instruction}`, `{current_response}`, `{current_rollout}`.
    pub next_step_prompt: String,

    /// System message for steps after the first, embedding the rollout.
    /// Placeholders: `{system_message}`, `{current_rollout}`.
    pub step_system_message: String,

    /// Rollout line announcing the step's instruction. Placeholder:
    /// `{instruction}`.
    pub instruction_contribution: String,

    /// Rollout line for a chat message. Placeholders: `{actor}`,
    /// `{content}`.
    pub chat_contribution: String,

    /// Rollout line announcing requested tool calls. Placeholder:
    /// `{called_tools}`.
    pub tool_call_contribution: String,
}

impl Default for AgentTemplates {
    fn default() -> Self {
        Self {
            system_message: DEFAULT_SYSTEM_MESSAGE.into(),
            next_step_prompt: DEFAULT_NEXT_STEP_PROMPT.into(),
            step_system_message: DEFAULT_STEP_SYSTEM_MESSAGE.into(),
            instruction_contribution: DEFAULT_INSTRUCTION_CONTRIBUTION.into(),
            chat_contribution: DEFAULT_CHAT_CONTRIBUTION.into(),
            tool_call_contribution: DEFAULT_TOOL_CALL_CONTRIBUTION.into(),
        }
    }
}

const DEFAULT_SYSTEM_MESSAGE: &str = "\
You are a helpful assistant working through a task step by step.

Think out loud as you work: reflect on what you observe, what it means,
and what to do next. Use the available tools whenever they help.";

const DEFAULT_NEXT_STEP_PROMPT: &str = "\
You are overseeing an assistant's progress on a user instruction. The
assistant thinks out loud as it works.

Below are the original instruction, the assistant's latest response, and
its thinking so far. Decide whether the latest response is sufficient to
answer the instruction.

If it is sufficient, produce a final step instructing the assistant to
state the answer, with last_step set to true. If it is not, produce the
next instruction to move the work forward, with last_step set to false.

<user-instruction>
{instruction}
</user-instruction>

<current-response>
{current_response}
</current-response>

<thinking-process>
{current_rollout}
</thinking-process>";

const DEFAULT_STEP_SYSTEM_MESSAGE: &str = "\
{system_message}

You are in the middle of working through a task. Here is your thinking
so far:

<my-thinking>
{current_rollout}
</my-thinking>

Continue your train of thought from where you left off.";

const DEFAULT_INSTRUCTION_CONTRIBUTION: &str = "My current instruction is '{instruction}'";

const DEFAULT_CHAT_CONTRIBUTION: &str = "{actor}: {content}";

const DEFAULT_TOOL_CALL_CONTRIBUTION: &str =
    "I need to make the following tool call(s): {called_tools}";

/// Substitute `{key}` slots in a template.
pub(crate) fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_slots() {
        let out = render("{actor}: {content}", &[("actor", "tool"), ("content", "42")]);
        assert_eq!(out, "tool: 42");
    }

    #[test]
    fn render_leaves_unknown_slots_alone() {
        let out = render("{actor}: {content}", &[("actor", "assistant")]);
        assert_eq!(out, "assistant: {content}");
    }

    #[test]
    fn default_planning_prompt_has_expected_slots() {
        let templates = AgentTemplates::default();
        for slot in ["{instruction}", "{current_response}", "{current_rollout}"] {
            assert!(templates.next_step_prompt.contains(slot), "missing {slot}");
        }
    }
}
