//! Task classification and strategy enums.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of coding work a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskType {
    BugFix,
    #[default]
    Feature,
    Refactor,
    Documentation,
    Test,
    Deployment,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::BugFix,
        TaskType::Feature,
        TaskType::Refactor,
        TaskType::Documentation,
        TaskType::Test,
        TaskType::Deployment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::BugFix => "BugFix",
            TaskType::Feature => "Feature",
            TaskType::Refactor => "Refactor",
            TaskType::Documentation => "Documentation",
            TaskType::Test => "Test",
            TaskType::Deployment => "Deployment",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace(['_', '-', ' '], "");
        match normalized.as_str() {
            "bugfix" | "bug" | "fix" => Ok(TaskType::BugFix),
            "feature" => Ok(TaskType::Feature),
            "refactor" => Ok(TaskType::Refactor),
            "documentation" | "docs" => Ok(TaskType::Documentation),
            "test" | "tests" => Ok(TaskType::Test),
            "deployment" | "deploy" => Ok(TaskType::Deployment),
            _ => Err(format!("unknown task type: {}", s)),
        }
    }
}

/// Estimated size of a task, assigned by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskComplexity {
    Simple,
    Medium,
    Complex,
    Epic,
}

impl TaskComplexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskComplexity::Simple => "Simple",
            TaskComplexity::Medium => "Medium",
            TaskComplexity::Complex => "Complex",
            TaskComplexity::Epic => "Epic",
        }
    }

    /// Strategy used when the caller does not override it.
    pub fn default_strategy(&self) -> ExecutionStrategy {
        match self {
            TaskComplexity::Simple => ExecutionStrategy::SingleShot,
            TaskComplexity::Medium => ExecutionStrategy::Iterative,
            TaskComplexity::Complex => ExecutionStrategy::MultiAgent,
            TaskComplexity::Epic => ExecutionStrategy::HybridExecution,
        }
    }
}

impl std::fmt::Display for TaskComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(TaskComplexity::Simple),
            "medium" => Ok(TaskComplexity::Medium),
            "complex" => Ok(TaskComplexity::Complex),
            "epic" => Ok(TaskComplexity::Epic),
            _ => Err(format!("unknown complexity: {}", s)),
        }
    }
}

/// Algorithm variant used to satisfy a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    SingleShot,
    Iterative,
    MultiAgent,
    /// MultiAgent planned at the highest effort tier with a larger
    /// step-parallelism budget.
    HybridExecution,
}

impl ExecutionStrategy {
    pub const ALL: [ExecutionStrategy; 4] = [
        ExecutionStrategy::SingleShot,
        ExecutionStrategy::Iterative,
        ExecutionStrategy::MultiAgent,
        ExecutionStrategy::HybridExecution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::SingleShot => "SingleShot",
            ExecutionStrategy::Iterative => "Iterative",
            ExecutionStrategy::MultiAgent => "MultiAgent",
            ExecutionStrategy::HybridExecution => "HybridExecution",
        }
    }

    /// Whether this strategy decomposes the task into a plan.
    pub fn uses_plan(&self) -> bool {
        matches!(
            self,
            ExecutionStrategy::MultiAgent | ExecutionStrategy::HybridExecution
        )
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace(['_', '-', ' '], "");
        match normalized.as_str() {
            "singleshot" => Ok(ExecutionStrategy::SingleShot),
            "iterative" => Ok(ExecutionStrategy::Iterative),
            "multiagent" => Ok(ExecutionStrategy::MultiAgent),
            "hybrid" | "hybridexecution" => Ok(ExecutionStrategy::HybridExecution),
            _ => Err(format!("unknown execution strategy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_mapping() {
        assert_eq!(
            TaskComplexity::Simple.default_strategy(),
            ExecutionStrategy::SingleShot
        );
        assert_eq!(
            TaskComplexity::Medium.default_strategy(),
            ExecutionStrategy::Iterative
        );
        assert_eq!(
            TaskComplexity::Complex.default_strategy(),
            ExecutionStrategy::MultiAgent
        );
        assert_eq!(
            TaskComplexity::Epic.default_strategy(),
            ExecutionStrategy::HybridExecution
        );
    }

    #[test]
    fn test_strategy_from_str_accepts_cli_spellings() {
        assert_eq!(
            "single-shot".parse::<ExecutionStrategy>().unwrap(),
            ExecutionStrategy::SingleShot
        );
        assert_eq!(
            "multi_agent".parse::<ExecutionStrategy>().unwrap(),
            ExecutionStrategy::MultiAgent
        );
        assert_eq!(
            "hybrid".parse::<ExecutionStrategy>().unwrap(),
            ExecutionStrategy::HybridExecution
        );
        assert!("quantum".parse::<ExecutionStrategy>().is_err());
    }

    #[test]
    fn test_task_type_round_trips_through_display() {
        for task_type in TaskType::ALL {
            assert_eq!(task_type.to_string().parse::<TaskType>().unwrap(), task_type);
        }
    }

    #[test]
    fn test_plan_strategies() {
        assert!(ExecutionStrategy::MultiAgent.uses_plan());
        assert!(ExecutionStrategy::HybridExecution.uses_plan());
        assert!(!ExecutionStrategy::Iterative.uses_plan());
    }
}
