//! Port definitions (interfaces for external dependencies)
//!
//! Ports define the boundaries between the application layer and external systems.
//! Implementations (adapters) are provided by the infrastructure layer.

pub mod classifier;
pub mod episode_memory;
pub mod event_publisher;
pub mod llm_client;
pub mod message_bus;
pub mod repository;
