//! Presentation layer for taskforge
//!
//! This crate contains the task REST contract (status codes, pagination and
//! SSE framing, independent of any HTTP server), CLI definitions and console
//! output formatting.

pub mod api;
pub mod cli;
pub mod output;
pub mod sse;

// Re-export commonly used types
pub use api::{ApiResponse, LogStreamResponse, Operation, TaskApi};
pub use cli::commands::{Cli, OutputFormat};
pub use output::console::ConsoleFormatter;
pub use sse::{DEFAULT_KEEPALIVE, KEEPALIVE_FRAME, data_frame, event_stream};
