//! Message bus adapters
//!
//! - [`InMemoryMessageBus`]: keeps sent messages and dead letters in memory
//! - [`JsonlMessageBus`]: appends one JSON line per message to a file

mod jsonl;
mod memory;

pub use jsonl::JsonlMessageBus;
pub use memory::InMemoryMessageBus;
