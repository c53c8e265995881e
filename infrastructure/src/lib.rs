//! Infrastructure layer for taskforge
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod bus;
pub mod classifier;
pub mod config;
pub mod llm;
pub mod store;

// Re-export commonly used types
pub use bus::{InMemoryMessageBus, JsonlMessageBus};
pub use classifier::HeuristicClassifier;
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileLlmConfig, FileLoggingConfig,
    FileOutputConfig, FileOutputFormat,
};
#[cfg(feature = "http-llm")]
pub use llm::{OpenAiCompatibleClient, OpenAiSettings};
pub use store::InMemoryTaskStore;
