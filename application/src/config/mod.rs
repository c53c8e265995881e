//! Application-level configuration.
//!
//! This module provides configuration types that control how the coordinator
//! and strategies behave:
//!
//! - [`CoordinatorConfig`]: worker pool, queue, model and admission settings
//! - [`RateLimitConfig`]: per-user execution quota
//! - [`StrategyConfig`]: round budgets, parallelism and timeouts per strategy
//! - [`RetryPolicy`]: event publication retry schedule

pub mod coordinator;
pub mod retry;
pub mod strategy;

pub use coordinator::{CoordinatorConfig, RateLimitConfig};
pub use retry::RetryPolicy;
pub use strategy::StrategyConfig;
