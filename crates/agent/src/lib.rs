//! Task execution engine for taskloom.
//!
//! The [`Agent`] owns the backbone LLM and a merged tool registry; each
//! `run()` spawns a [`TaskHandler`] that plans, executes, and records one
//! task's steps until a terminal signal, resolving a completion handle
//! the caller awaits.

pub mod agent;
pub mod builder;
pub mod handler;
pub mod templates;

pub use agent::Agent;
pub use builder::AgentBuilder;
pub use handler::{HandlerState, Plan, TaskHandler};
pub use templates::AgentTemplates;
