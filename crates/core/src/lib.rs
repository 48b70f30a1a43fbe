//! # taskloom Core
//!
//! Domain types, traits, and error definitions for the taskloom agent
//! engine. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping LLM backends and tool providers via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod llm;
pub mod provider;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use llm::{ChatMessage, ChatRole, CompleteResult, Llm};
pub use provider::ToolProvider;
pub use task::{Task, TaskResult, TaskStep, TaskStepResult};
pub use tool::{AgentTool, AsyncTool, Tool, ToolCall, ToolCallResult, ToolDescriptor, ToolRegistry};
