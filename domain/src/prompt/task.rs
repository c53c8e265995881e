//! Prompt templates for task execution strategies

use crate::plan::{EffortTier, Plan, PlanFeedback, PlanStep, PlanStepStatus};
use crate::task::CodingTask;

/// Templates for generating prompts at each strategy stage
pub struct TaskPromptTemplate;

impl TaskPromptTemplate {
    /// System prompt for any code-producing call
    pub fn coder_system() -> &'static str {
        r#"You are a senior software engineer completing a coding task.
Produce working, idiomatic code. Put code in fenced blocks with a language tag.
Keep explanations short and focused on what changed."#
    }

    fn task_header(task: &CodingTask) -> String {
        format!(
            "## Task: {}\n\nType: {}\n\n{}",
            task.title(),
            task.task_type(),
            task.description()
        )
    }

    /// Single-shot prompt: the task description is the whole request.
    pub fn single_shot(task: &CodingTask) -> String {
        format!(
            "{}\n\nComplete this task in a single response.",
            Self::task_header(task)
        )
    }

    /// System prompt for self-critique
    pub fn critique_system() -> &'static str {
        r#"You are a meticulous code reviewer critiquing a draft solution.
Look for bugs, missing edge cases and unmet requirements. Do not rewrite the code."#
    }

    pub fn critique(task: &CodingTask, draft: &str) -> String {
        format!(
            r#"{header}

## Draft Solution

{draft}

## Instructions

Decide whether issues remain that must be fixed before this draft satisfies the task.
Respond with JSON only:

```json
{{"issues_remain": true, "issues": ["short description of each issue"]}}
```

Use `"issues_remain": false` with an empty list when the draft is acceptable."#,
            header = Self::task_header(task),
            draft = draft
        )
    }

    pub fn refine(task: &CodingTask, draft: &str, issues: &[String]) -> String {
        let issue_list = issues
            .iter()
            .map(|i| format!("- {}", i))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"{header}

## Previous Draft

{draft}

## Issues Found

{issue_list}

Produce a complete revised solution that fixes every issue above."#,
            header = Self::task_header(task),
            draft = draft,
            issue_list = issue_list
        )
    }

    /// System prompt for the planner role
    pub fn planning_system() -> &'static str {
        r#"You are a technical lead decomposing a goal into an executable plan.
Each step must be small enough for one engineer to finish and verify.
Respond with a single JSON object and nothing else."#
    }

    /// Planning prompt with optional past-episode summaries.
    pub fn planning(goal: &str, context: &str, episodes: &[String], tier: EffortTier) -> String {
        let episodes_section = if episodes.is_empty() {
            String::new()
        } else {
            let list = episodes
                .iter()
                .map(|e| format!("- {}", e))
                .collect::<Vec<_>>()
                .join("\n");
            format!("## Similar Past Work\n\n{}\n\n", list)
        };
        let context_section = if context.trim().is_empty() {
            String::new()
        } else {
            format!("## Context\n\n{}\n\n", context)
        };

        format!(
            r#"## Goal

{goal}

{context_section}{episodes_section}## Instructions

Plan at the "{tier}" effort tier: use at most {max_steps} steps.
For every step give an id, a description, the ids of steps it depends on,
an effort estimate (trivial, small, medium or large) and a validation criterion.
Dependencies may only reference ids of other steps in this plan.

```json
{{
  "description": "one-paragraph approach",
  "steps": [
    {{"id": "step_1", "description": "...", "dependencies": [], "effort": "small",
      "validation": "...", "sub_steps": []}}
  ],
  "risks": ["..."]
}}
```"#,
            goal = goal,
            context_section = context_section,
            episodes_section = episodes_section,
            tier = tier,
            max_steps = tier.max_steps()
        )
    }

    pub fn refine_plan(plan: &Plan, feedback: &PlanFeedback) -> String {
        let steps = plan
            .steps
            .iter()
            .map(|s| {
                let deps = if s.dependencies.is_empty() {
                    "none".to_string()
                } else {
                    s.dependencies
                        .iter()
                        .map(|d| d.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!("- {} [{}] {} (depends on: {})", s.id, s.status, s.description, deps)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let failed = feedback
            .failed_step
            .as_ref()
            .map(|id| format!("Failed step: {}\n", id))
            .unwrap_or_default();

        format!(
            r#"## Goal

{goal}

## Current Plan

{steps}

## Failure

{failed}Reason: {reason}

## Instructions

Revise the plan so the goal can still be reached. Completed steps are kept as-is;
you may reference their ids as dependencies but must not repeat them.
Respond with the same JSON schema as the original plan."#,
            goal = plan.goal,
            steps = steps,
            failed = failed,
            reason = feedback.reason
        )
    }

    /// Coder prompt for one plan step, including outputs of its dependencies.
    pub fn coder_step(task: &CodingTask, plan: &Plan, step: &PlanStep) -> String {
        let prior = step
            .dependencies
            .iter()
            .filter_map(|id| plan.step(id))
            .filter(|s| s.status == PlanStepStatus::Completed)
            .filter_map(|s| s.result.as_ref().map(|r| (s, r)))
            .map(|(s, r)| format!("### {} - {}\n\n{}", s.id, s.description, r.output))
            .collect::<Vec<_>>()
            .join("\n\n");
        let sub_steps = step
            .sub_steps
            .iter()
            .map(|s| format!("- {}", s.description))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = format!(
            "{}\n\n## Plan Step {}\n\n{}\n",
            Self::task_header(task),
            step.id,
            step.description
        );
        if !sub_steps.is_empty() {
            prompt.push_str(&format!("\nBreakdown:\n{}\n", sub_steps));
        }
        if !step.validation.is_empty() {
            prompt.push_str(&format!("\nDone when: {}\n", step.validation));
        }
        if !prior.is_empty() {
            prompt.push_str(&format!("\n## Completed Prerequisites\n\n{}\n", prior));
        }
        prompt.push_str("\nImplement only this step.");
        prompt
    }

    /// System prompt for the reviewer role
    pub fn reviewer_system() -> &'static str {
        r#"You are a strict code reviewer. Judge whether the submitted work completes its step.
Severity scale: 1 cosmetic, 2 minor, 3 moderate, 4 serious, 5 broken."#
    }

    pub fn reviewer_step(step: &PlanStep, output: &str) -> String {
        format!(
            r#"## Step {id}

{description}

Done when: {validation}

## Submitted Work

{output}

## Instructions

Respond with JSON only:

```json
{{"isApproved": true, "issues": [], "suggestions": [], "severity": 1}}
```"#,
            id = step.id,
            description = step.description,
            validation = if step.validation.is_empty() {
                "the description is satisfied"
            } else {
                step.validation.as_str()
            },
            output = output
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStep;
    use crate::task::TaskType;

    fn task() -> CodingTask {
        CodingTask::new("u", "Add cache", "Add an LRU cache", TaskType::Feature).unwrap()
    }

    #[test]
    fn test_planning_prompt_includes_episodes_and_tier() {
        let prompt = TaskPromptTemplate::planning(
            "Add cache",
            "",
            &["Added a TTL cache to the session store".to_string()],
            EffortTier::Large,
        );
        assert!(prompt.contains("Similar Past Work"));
        assert!(prompt.contains("TTL cache"));
        assert!(prompt.contains("at most 12 steps"));
    }

    #[test]
    fn test_planning_prompt_omits_empty_sections() {
        let prompt = TaskPromptTemplate::planning("g", "", &[], EffortTier::Medium);
        assert!(!prompt.contains("Similar Past Work"));
        assert!(!prompt.contains("## Context"));
    }

    #[test]
    fn test_coder_step_includes_completed_dependencies() {
        let mut plan = Plan::new(
            "Add cache",
            "",
            vec![
                PlanStep::new("step_1", "design"),
                PlanStep::new("step_2", "implement").with_dependency("step_1"),
            ],
            Vec::new(),
        );
        plan.start_step(&"step_1".into()).unwrap();
        plan.complete_step(
            &"step_1".into(),
            crate::plan::StepResult::default().with_output("struct Lru;"),
        )
        .unwrap();

        let step = plan.step(&"step_2".into()).unwrap().clone();
        let prompt = TaskPromptTemplate::coder_step(&task(), &plan, &step);
        assert!(prompt.contains("struct Lru;"));
        assert!(prompt.contains("## Plan Step step_2"));
    }

    #[test]
    fn test_refine_lists_issues() {
        let prompt = TaskPromptTemplate::refine(&task(), "draft", &["no eviction".to_string()]);
        assert!(prompt.contains("- no eviction"));
    }
}
