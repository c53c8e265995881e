//! Prompt domain
//!
//! Templates for every model call made by the execution strategies.

mod task;

pub use task::TaskPromptTemplate;
