//! Plan domain entities

use crate::core::error::DomainError;
use crate::core::id::uuid_id;
use crate::review::ReviewVerdict;
use crate::task::value_objects::Usage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

uuid_id!(
    /// Unique identifier for a plan held by the planning service.
    PlanId
);

/// Identifier of a step, unique within its plan (e.g. `step_1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Estimated effort of a step, also the depth requested from the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum EffortTier {
    Trivial,
    Small,
    #[default]
    Medium,
    Large,
}

impl EffortTier {
    pub fn highest() -> Self {
        EffortTier::Large
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffortTier::Trivial => "trivial",
            EffortTier::Small => "small",
            EffortTier::Medium => "medium",
            EffortTier::Large => "large",
        }
    }

    /// Upper bound on steps requested from the planner at this tier.
    pub fn max_steps(&self) -> usize {
        match self {
            EffortTier::Trivial => 1,
            EffortTier::Small => 3,
            EffortTier::Medium => 6,
            EffortTier::Large => 12,
        }
    }

    /// Lenient parse of model-provided effort labels.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "trivial" | "xs" | "tiny" => EffortTier::Trivial,
            "small" | "s" | "low" => EffortTier::Small,
            "large" | "l" | "xl" | "high" | "big" => EffortTier::Large,
            _ => EffortTier::Medium,
        }
    }
}

impl std::fmt::Display for EffortTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlanStepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl PlanStepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStepStatus::Pending => "Pending",
            PlanStepStatus::InProgress => "InProgress",
            PlanStepStatus::Completed => "Completed",
            PlanStepStatus::Failed => "Failed",
            PlanStepStatus::Skipped => "Skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStepStatus::Completed | PlanStepStatus::Failed | PlanStepStatus::Skipped
        )
    }
}

impl std::fmt::Display for PlanStepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlanStatus {
    #[default]
    Created,
    InProgress,
    Completed,
    Failed,
}

/// Outcome recorded on a finished step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepResult {
    /// Coder output
    pub output: String,
    pub review: Option<ReviewVerdict>,
    pub usage: Usage,
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(output: impl Into<String>, review: ReviewVerdict, usage: Usage) -> Self {
        Self {
            output: output.into(),
            review: Some(review),
            usage,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, usage: Usage) -> Self {
        Self {
            error: Some(error.into()),
            usage,
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_review(mut self, review: ReviewVerdict) -> Self {
        self.review = Some(review);
        self
    }
}

/// A single step within a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: StepId,
    pub description: String,
    /// Sibling step ids that must complete first
    pub dependencies: Vec<StepId>,
    pub effort: EffortTier,
    /// How to tell the step is done
    pub validation: String,
    /// Finer-grained breakdown, passed to the coder as guidance
    pub sub_steps: Vec<PlanStep>,
    pub status: PlanStepStatus,
    pub result: Option<StepResult>,
}

impl PlanStep {
    pub fn new(id: impl Into<StepId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: Vec::new(),
            effort: EffortTier::default(),
            validation: String::new(),
            sub_steps: Vec::new(),
            status: PlanStepStatus::Pending,
            result: None,
        }
    }

    pub fn with_dependency(mut self, id: impl Into<StepId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_effort(mut self, effort: EffortTier) -> Self {
        self.effort = effort;
        self
    }

    pub fn with_validation(mut self, validation: impl Into<String>) -> Self {
        self.validation = validation.into();
        self
    }

    pub fn with_sub_step(mut self, step: PlanStep) -> Self {
        self.sub_steps.push(step);
        self
    }
}

/// Structured failure record handed to plan refinement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeedback {
    pub failed_step: Option<StepId>,
    pub reason: String,
}

impl PlanFeedback {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            failed_step: None,
            reason: reason.into(),
        }
    }

    pub fn for_step(step: StepId, reason: impl Into<String>) -> Self {
        Self {
            failed_step: Some(step),
            reason: reason.into(),
        }
    }
}

/// Where a plan stands with respect to scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanProgress {
    /// At least one step can start now
    Ready,
    /// Nothing can start until a running step finishes
    Waiting,
    /// Every step is terminal
    Finished,
    /// Pending steps remain but none can ever start
    Deadlocked,
}

/// A dependency-ordered decomposition of a goal (Entity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub goal: String,
    pub description: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    pub risks: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Build a plan, repairing ids and pruning dependencies that do not
    /// reference a sibling step.
    pub fn new(
        goal: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<PlanStep>,
        risks: Vec<String>,
    ) -> Self {
        let mut plan = Self {
            id: PlanId::generate(),
            goal: goal.into(),
            description: description.into(),
            steps,
            status: PlanStatus::Created,
            risks,
            created_at: Utc::now(),
        };
        plan.normalize();
        plan
    }

    /// Fallback plan: the whole goal as one step.
    pub fn single_step(goal: impl Into<String>) -> Self {
        let goal = goal.into();
        let step = PlanStep::new("step_1", goal.clone())
            .with_validation("The goal is satisfied");
        Self::new(goal, "Single-step fallback plan", vec![step], Vec::new())
    }

    fn normalize(&mut self) {
        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter_mut().enumerate() {
            if step.id.as_str().trim().is_empty() || seen.contains(&step.id) {
                let mut n = index + 1;
                while seen.contains(&StepId::new(format!("step_{}", n))) {
                    n += 1;
                }
                step.id = StepId::new(format!("step_{}", n));
            }
            seen.insert(step.id.clone());
        }

        for step in &mut self.steps {
            let own = step.id.clone();
            let mut kept = HashSet::new();
            step.dependencies
                .retain(|dep| *dep != own && seen.contains(dep) && kept.insert(dep.clone()));
        }
    }

    pub fn step(&self, id: &StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|s| &s.id == id)
    }

    fn step_mut(&mut self, id: &StepId) -> Result<&mut PlanStep, DomainError> {
        let plan_id = self.id;
        self.steps
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| DomainError::not_found("plan step", format!("{}/{}", plan_id, id)))
    }

    fn status_of(&self, id: &StepId) -> Option<PlanStepStatus> {
        self.step(id).map(|s| s.status)
    }

    fn dependencies_completed(&self, step: &PlanStep) -> bool {
        step.dependencies
            .iter()
            .all(|dep| self.status_of(dep) == Some(PlanStepStatus::Completed))
    }

    /// Pending steps whose dependencies are all completed, in plan order.
    pub fn ready_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == PlanStepStatus::Pending && self.dependencies_completed(s))
            .collect()
    }

    /// The lowest-ordered eligible step.
    pub fn next_step(&self) -> Result<&PlanStep, DomainError> {
        if let Some(step) = self.ready_steps().into_iter().next() {
            return Ok(step);
        }
        let reason = match self.progress() {
            PlanProgress::Finished => "plan finished",
            PlanProgress::Waiting => "waiting on running steps",
            _ => "plan deadlocked",
        };
        Err(DomainError::NoEligibleStep {
            plan_id: self.id.to_string(),
            reason: reason.to_string(),
        })
    }

    pub fn progress(&self) -> PlanProgress {
        if self.steps.iter().all(|s| s.status.is_terminal()) {
            PlanProgress::Finished
        } else if !self.ready_steps().is_empty() {
            PlanProgress::Ready
        } else if self
            .steps
            .iter()
            .any(|s| s.status == PlanStepStatus::InProgress)
        {
            PlanProgress::Waiting
        } else {
            PlanProgress::Deadlocked
        }
    }

    /// Pending → InProgress, only when every dependency is completed.
    pub fn start_step(&mut self, id: &StepId) -> Result<(), DomainError> {
        let step = self
            .step(id)
            .ok_or_else(|| DomainError::not_found("plan step", id))?;
        if step.status != PlanStepStatus::Pending || !self.dependencies_completed(step) {
            return Err(DomainError::illegal_transition(
                "plan step",
                step.status,
                PlanStepStatus::InProgress,
            ));
        }

        self.step_mut(id)?.status = PlanStepStatus::InProgress;
        if self.status == PlanStatus::Created {
            self.status = PlanStatus::InProgress;
        }
        Ok(())
    }

    pub fn complete_step(&mut self, id: &StepId, result: StepResult) -> Result<(), DomainError> {
        let step = self.step_mut(id)?;
        if step.status != PlanStepStatus::InProgress {
            return Err(DomainError::illegal_transition(
                "plan step",
                step.status,
                PlanStepStatus::Completed,
            ));
        }
        step.status = PlanStepStatus::Completed;
        step.result = Some(result);
        self.refresh_status();
        Ok(())
    }

    /// Fail a step and skip everything that transitively depends on it.
    ///
    /// Returns the ids of the skipped steps.
    pub fn fail_step(&mut self, id: &StepId, result: StepResult) -> Result<Vec<StepId>, DomainError> {
        let step = self.step_mut(id)?;
        if step.status != PlanStepStatus::InProgress {
            return Err(DomainError::illegal_transition(
                "plan step",
                step.status,
                PlanStepStatus::Failed,
            ));
        }
        step.status = PlanStepStatus::Failed;
        step.result = Some(result);

        let skipped = self.skip_dependents_of(id);
        self.status = PlanStatus::Failed;
        Ok(skipped)
    }

    fn skip_dependents_of(&mut self, root: &StepId) -> Vec<StepId> {
        let mut dependents: HashMap<&StepId, Vec<&StepId>> = HashMap::new();
        for step in &self.steps {
            for dep in &step.dependencies {
                dependents.entry(dep).or_default().push(&step.id);
            }
        }

        let mut to_skip = HashSet::new();
        let mut frontier = vec![root];
        while let Some(current) = frontier.pop() {
            for child in dependents.get(current).into_iter().flatten() {
                if to_skip.insert((*child).clone()) {
                    frontier.push(*child);
                }
            }
        }

        let mut skipped = Vec::new();
        for step in &mut self.steps {
            if to_skip.contains(&step.id) && step.status == PlanStepStatus::Pending {
                step.status = PlanStepStatus::Skipped;
                skipped.push(step.id.clone());
            }
        }
        skipped
    }

    /// Give up on the plan: every pending step is skipped.
    pub fn abandon(&mut self) {
        for step in &mut self.steps {
            if step.status == PlanStepStatus::Pending {
                step.status = PlanStepStatus::Skipped;
            }
        }
        self.status = PlanStatus::Failed;
    }

    fn refresh_status(&mut self) {
        if self.status == PlanStatus::Failed {
            return;
        }
        if self
            .steps
            .iter()
            .all(|s| s.status == PlanStepStatus::Completed)
        {
            self.status = PlanStatus::Completed;
        }
    }

    /// Merge a refined plan into this one.
    ///
    /// Completed steps keep their status and result verbatim, in their
    /// original order; every other step comes from `refined` as Pending.
    pub fn merge_refinement(&mut self, refined: Plan) {
        let completed: Vec<PlanStep> = self
            .steps
            .iter()
            .filter(|s| s.status == PlanStepStatus::Completed)
            .cloned()
            .collect();
        let completed_ids: HashSet<StepId> = completed.iter().map(|s| s.id.clone()).collect();

        let mut steps = completed;
        steps.extend(
            refined
                .steps
                .into_iter()
                .filter(|s| !completed_ids.contains(&s.id))
                .map(|mut s| {
                    s.status = PlanStepStatus::Pending;
                    s.result = None;
                    s
                }),
        );

        if !refined.description.is_empty() {
            self.description = refined.description;
        }
        for risk in refined.risks {
            if !self.risks.contains(&risk) {
                self.risks.push(risk);
            }
        }
        self.steps = steps;
        self.status = if completed_ids.is_empty() {
            PlanStatus::Created
        } else {
            PlanStatus::InProgress
        };
        self.normalize();
        self.refresh_status();
    }

    /// Sum of usage recorded on every finished step.
    pub fn usage(&self) -> Usage {
        let mut total = Usage::default();
        for result in self.steps.iter().filter_map(|s| s.result.as_ref()) {
            total.add(result.usage);
        }
        total
    }

    /// (completed, total)
    pub fn completion(&self) -> (usize, usize) {
        let done = self
            .steps
            .iter()
            .filter(|s| s.status == PlanStepStatus::Completed)
            .count();
        (done, self.steps.len())
    }

    /// Highest effort tier requested by any step.
    pub fn max_effort(&self) -> EffortTier {
        self.steps
            .iter()
            .map(|s| s.effort)
            .max()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Plan {
        Plan::new(
            "Add caching",
            "",
            vec![
                PlanStep::new("step_1", "design"),
                PlanStep::new("step_2", "implement").with_dependency("step_1"),
                PlanStep::new("step_3", "test").with_dependency("step_2"),
            ],
            Vec::new(),
        )
    }

    fn ok() -> StepResult {
        StepResult::success("done", ReviewVerdict::approved(), Usage::new(10, 0.001))
    }

    fn ids(steps: &[&PlanStep]) -> Vec<String> {
        steps.iter().map(|s| s.id.to_string()).collect()
    }

    // ==================== Normalization ====================

    #[test]
    fn test_unknown_and_self_dependencies_are_pruned() {
        let plan = Plan::new(
            "g",
            "",
            vec![
                PlanStep::new("a", "x")
                    .with_dependency("a")
                    .with_dependency("ghost"),
                PlanStep::new("b", "y")
                    .with_dependency("a")
                    .with_dependency("a"),
            ],
            Vec::new(),
        );
        assert!(plan.steps[0].dependencies.is_empty());
        assert_eq!(plan.steps[1].dependencies, vec![StepId::new("a")]);
    }

    #[test]
    fn test_duplicate_and_empty_ids_are_renamed() {
        let plan = Plan::new(
            "g",
            "",
            vec![
                PlanStep::new("step_1", "x"),
                PlanStep::new("step_1", "y"),
                PlanStep::new("", "z"),
            ],
            Vec::new(),
        );
        let ids: HashSet<_> = plan.steps.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    // ==================== Scheduling ====================

    #[test]
    fn test_chain_is_served_in_dependency_order() {
        let mut plan = chain();
        assert_eq!(plan.next_step().unwrap().id.as_str(), "step_1");

        plan.start_step(&"step_1".into()).unwrap();
        let err = plan.next_step().unwrap_err();
        assert!(matches!(err, DomainError::NoEligibleStep { .. }));
        assert_eq!(plan.progress(), PlanProgress::Waiting);

        plan.complete_step(&"step_1".into(), ok()).unwrap();
        assert_eq!(plan.next_step().unwrap().id.as_str(), "step_2");
        assert_eq!(plan.status, PlanStatus::InProgress);
    }

    #[test]
    fn test_step_cannot_start_before_dependencies() {
        let mut plan = chain();
        let err = plan.start_step(&"step_2".into()).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(plan.steps[1].status, PlanStepStatus::Pending);
    }

    #[test]
    fn test_independent_steps_are_ready_together() {
        let plan = Plan::new(
            "g",
            "",
            vec![
                PlanStep::new("a", "x"),
                PlanStep::new("b", "y"),
                PlanStep::new("c", "z").with_dependency("a").with_dependency("b"),
            ],
            Vec::new(),
        );
        assert_eq!(ids(&plan.ready_steps()), vec!["a", "b"]);
    }

    #[test]
    fn test_plan_completes_when_every_step_completes() {
        let mut plan = chain();
        for id in ["step_1", "step_2", "step_3"] {
            plan.start_step(&id.into()).unwrap();
            plan.complete_step(&id.into(), ok()).unwrap();
        }
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.progress(), PlanProgress::Finished);
        assert_eq!(plan.usage().tokens_used, 30);
        assert_eq!(plan.completion(), (3, 3));
    }

    #[test]
    fn test_failed_step_skips_transitive_dependents() {
        let mut plan = chain();
        plan.start_step(&"step_1".into()).unwrap();
        plan.complete_step(&"step_1".into(), ok()).unwrap();
        plan.start_step(&"step_2".into()).unwrap();

        let skipped = plan
            .fail_step(&"step_2".into(), StepResult::failure("severity 5", Usage::default()))
            .unwrap();
        assert_eq!(skipped, vec![StepId::new("step_3")]);
        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(plan.steps[2].status, PlanStepStatus::Skipped);
        assert!(plan.start_step(&"step_3".into()).is_err());
    }

    #[test]
    fn test_cycle_is_deadlocked() {
        let plan = Plan::new(
            "g",
            "",
            vec![
                PlanStep::new("a", "x").with_dependency("b"),
                PlanStep::new("b", "y").with_dependency("a"),
            ],
            Vec::new(),
        );
        assert_eq!(plan.progress(), PlanProgress::Deadlocked);
        match plan.next_step() {
            Err(DomainError::NoEligibleStep { reason, .. }) => assert_eq!(reason, "plan deadlocked"),
            other => panic!("expected deadlock, got {:?}", other),
        }
    }

    // ==================== Refinement ====================

    #[test]
    fn test_refinement_preserves_completed_steps() {
        let mut plan = chain();
        plan.start_step(&"step_1".into()).unwrap();
        plan.complete_step(&"step_1".into(), ok()).unwrap();
        let original_id = plan.id;

        let refined = Plan::new(
            "Add caching",
            "revised",
            vec![
                PlanStep::new("step_1", "redo design"),
                PlanStep::new("step_2b", "implement differently"),
            ],
            vec!["cache invalidation".into()],
        );
        let refined_step = PlanStep::new("step_3", "test").with_dependency("step_2b");
        let mut refined = refined;
        refined.steps.push(refined_step);
        plan.merge_refinement(refined);

        assert_eq!(plan.id, original_id);
        assert_eq!(plan.steps[0].description, "design");
        assert_eq!(plan.steps[0].status, PlanStepStatus::Completed);
        assert_eq!(plan.steps[0].result, Some(ok()));
        assert_eq!(ids(&plan.ready_steps()), vec!["step_2b"]);
        assert_eq!(plan.risks, vec!["cache invalidation"]);
        assert_eq!(plan.status, PlanStatus::InProgress);
    }

    #[test]
    fn test_single_step_fallback() {
        let plan = Plan::single_step("Fix the bug");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].description, "Fix the bug");
        assert_eq!(plan.goal, "Fix the bug");
    }

    #[test]
    fn test_effort_parse() {
        assert_eq!(EffortTier::parse_lenient("XL"), EffortTier::Large);
        assert_eq!(EffortTier::parse_lenient("?"), EffortTier::Medium);
        assert_eq!(EffortTier::highest().max_steps(), 12);
    }
}
