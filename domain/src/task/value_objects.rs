//! Task value objects - identifiers, classification and execution results.
//!
//! # Identifiers
//! - [`TaskId`] - Unique identifier for a coding task
//! - [`ExecutionId`] - Unique identifier for one execution attempt
//! - [`UserId`] - Owner of a task, the key for admission control
//!
//! # Execution Data
//! - [`Classification`] - Output of the external classifier
//! - [`ExecutionResult`] - Tokens, cost and artifacts of an execution
//! - [`Artifact`] - A generated piece of code or text

use super::types::{TaskComplexity, TaskType};
use crate::core::id::uuid_id;
use serde::{Deserialize, Serialize};

uuid_id!(
    /// Unique identifier for a coding task.
    TaskId
);

uuid_id!(
    /// Unique identifier for a single execution attempt of a task.
    ExecutionId
);

/// Identifier of the user that owns a task.
///
/// Opaque to the core; authentication happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for UserId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of classifying a task description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub task_type: TaskType,
    pub complexity: TaskComplexity,
    /// Confidence in the range 0.0..=1.0
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Classification {
    pub fn new(task_type: TaskType, complexity: TaskComplexity, confidence: f64) -> Self {
        Self {
            task_type,
            complexity,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: String::new(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

/// Kind of generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Code,
    Text,
    Plan,
    Review,
}

/// A generated code or text artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub content: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            content: content.into(),
        }
    }

    /// Classifies free-form model output: fenced code means a code artifact.
    pub fn from_output(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let kind = if content.contains("```") {
            ArtifactKind::Code
        } else {
            ArtifactKind::Text
        };
        Self::new(name, kind, content)
    }
}

/// Token and cost usage of one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub tokens_used: u64,
    pub cost_usd: f64,
}

impl Usage {
    pub fn new(tokens_used: u64, cost_usd: f64) -> Self {
        Self {
            tokens_used,
            cost_usd,
        }
    }

    pub fn add(&mut self, other: Usage) {
        self.tokens_used += other.tokens_used;
        self.cost_usd += other.cost_usd;
    }
}

/// Structured result of an execution (value object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub artifacts: Vec<Artifact>,
    /// Short human-readable summary
    #[serde(default)]
    pub summary: String,
    /// Reviewer suggestions surfaced from approved steps
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ExecutionResult {
    pub fn new(usage: Usage) -> Self {
        Self {
            tokens_used: usage.tokens_used,
            cost_usd: usage.cost_usd,
            ..Default::default()
        }
    }

    pub fn usage(&self) -> Usage {
        Usage::new(self.tokens_used, self.cost_usd)
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_parse_back() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<TaskId>().unwrap(), a);
        assert!(!a.is_nil());
    }

    #[test]
    fn test_classification_clamps_confidence() {
        let c = Classification::new(TaskType::BugFix, TaskComplexity::Simple, 1.7);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn test_artifact_kind_detection() {
        assert_eq!(
            Artifact::from_output("a", "```rust\nfn main() {}\n```").kind,
            ArtifactKind::Code
        );
        assert_eq!(Artifact::from_output("b", "plain words").kind, ArtifactKind::Text);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = Usage::default();
        usage.add(Usage::new(100, 0.01));
        usage.add(Usage::new(50, 0.005));
        assert_eq!(usage.tokens_used, 150);
        assert!((usage.cost_usd - 0.015).abs() < 1e-9);
    }
}
