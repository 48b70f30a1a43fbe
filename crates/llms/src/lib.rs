//! LLM backend implementations for taskloom.
//!
//! One backend covers most of the field: [`OpenAiCompatLlm`] speaks the
//! OpenAI chat-completions dialect used by OpenAI, OpenRouter, Ollama,
//! vLLM, and friends. Anything else can implement the core `Llm` trait
//! directly.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatLlm;
