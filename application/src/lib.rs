//! Application layer for taskforge
//!
//! This crate contains port definitions, execution strategies, the planning
//! service, the execution coordinator, the reliable event publisher and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod coordinator;
pub mod logs;
pub mod planning;
pub mod ports;
pub mod publisher;
pub mod strategies;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{CoordinatorConfig, RateLimitConfig, RetryPolicy, StrategyConfig};
pub use coordinator::{
    AdmissionControl, CoordinatorError, ExecuteRequest, ExecutionCoordinator, ExecutionTicket,
    NewTask, SlidingWindowRateLimiter, WorkerPool,
};
pub use logs::{ExecutionLogHub, ExecutionLogWriter, LogSubscription};
pub use planning::{PlanOutcome, PlanningError, PlanningService};
pub use ports::{
    classifier::{ClassifierClient, ClassifierError},
    episode_memory::{EpisodeMemory, NoEpisodeMemory},
    event_publisher::{EventPublisher, PublishError, PublishOutcome},
    llm_client::{ChatMessage, ChatRole, LlmClient, LlmError, LlmRequest, LlmResponse},
    message_bus::{DeadLetter, MessageBus, OutboundMessage, TransportError},
    repository::{
        DEFAULT_PAGE_SIZE, ExecutionRepository, MAX_PAGE_SIZE, Page, RepositoryError, TaskQuery,
        TaskRepository,
    },
};
pub use publisher::ReliableEventPublisher;
pub use strategies::{
    ExecutionContext, ExecutionStrategyRunner, IterativeStrategy, MultiAgentStrategy,
    ReviewerAgent, SingleShotStrategy, StrategyError, StrategyRegistry, UsageMeter,
};
