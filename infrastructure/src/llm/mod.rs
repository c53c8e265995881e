//! LLM client adapters

#[cfg(feature = "http-llm")]
mod openai;

#[cfg(feature = "http-llm")]
pub use openai::{OpenAiCompatibleClient, OpenAiSettings};
