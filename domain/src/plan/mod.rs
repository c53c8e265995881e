//! Goal decomposition plans
//!
//! A [`Plan`] is a dependency-ordered list of [`PlanStep`]s. Scheduling rules
//! (a step starts only once its dependencies are completed, failure skips
//! dependents) live on the entity; [`parse_plan`] turns planner output into one.

pub mod entities;
pub mod parser;

pub use entities::{
    EffortTier, Plan, PlanFeedback, PlanId, PlanProgress, PlanStatus, PlanStep, PlanStepStatus, StepId,
    StepResult,
};
pub use parser::{parse_plan, parse_plan_json};
