//! Plan parsing from model responses.
//!
//! Planner output is parsed leniently: the first balanced JSON object is
//! taken from whatever prose or fences surround it. [`parse_plan`] never
//! fails; an unusable response becomes [`Plan::single_step`] of the goal.

use super::entities::{EffortTier, Plan, PlanStep};
use crate::core::json::extract_first_json_object;

/// Parse a planner response, falling back to a single-step plan.
pub fn parse_plan(goal: &str, response: &str) -> Plan {
    extract_first_json_object(response)
        .and_then(|json| parse_plan_json(goal, &json))
        .unwrap_or_else(|| Plan::single_step(goal))
}

/// Convert a JSON value to a string id (numbers are stringified, null and
/// empty strings are `None`).
fn json_value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a plan from a JSON value.
///
/// Expected schema:
/// ```json
/// {
///   "goal": "string (optional, defaults to the requested goal)",
///   "description": "string (optional)",
///   "steps": [
///     {
///       "id": "step_1",
///       "description": "string",
///       "dependencies": ["step_id", ...],
///       "effort": "trivial | small | medium | large",
///       "validation": "string",
///       "sub_steps": [ ... ]
///     }
///   ],
///   "risks": ["string", ...]
/// }
/// ```
///
/// Returns `None` when `steps` is missing or empty.
pub fn parse_plan_json(goal: &str, json: &serde_json::Value) -> Option<Plan> {
    let steps = json
        .get("steps")
        .or_else(|| json.get("tasks"))
        .and_then(|v| v.as_array())?;
    if steps.is_empty() {
        return None;
    }

    let steps: Vec<PlanStep> = steps
        .iter()
        .enumerate()
        .map(|(index, step)| parse_step(step, &format!("step_{}", index + 1)))
        .collect();

    let goal = json
        .get("goal")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(goal);
    let description = json
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let risks = json
        .get("risks")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|r| r.as_str())
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(Plan::new(goal, description, steps, risks))
}

fn parse_step(json: &serde_json::Value, default_id: &str) -> PlanStep {
    let id = json
        .get("id")
        .and_then(json_value_to_string)
        .unwrap_or_else(|| default_id.to_string());
    let description = json
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("No description");

    let mut step = PlanStep::new(id.as_str(), description);

    if let Some(deps) = json
        .get("dependencies")
        .or_else(|| json.get("depends_on"))
        .and_then(|v| v.as_array())
    {
        for dep in deps {
            if let Some(dep_id) = json_value_to_string(dep) {
                step = step.with_dependency(dep_id);
            }
        }
    }

    if let Some(effort) = json
        .get("effort")
        .or_else(|| json.get("estimated_effort"))
        .and_then(|v| v.as_str())
    {
        step = step.with_effort(EffortTier::parse_lenient(effort));
    }

    if let Some(validation) = json
        .get("validation")
        .or_else(|| json.get("validation_criteria"))
        .and_then(|v| v.as_str())
    {
        step = step.with_validation(validation);
    }

    if let Some(subs) = json
        .get("sub_steps")
        .or_else(|| json.get("subSteps"))
        .and_then(|v| v.as_array())
    {
        for (index, sub) in subs.iter().enumerate() {
            step = step.with_sub_step(parse_step(sub, &format!("{}.{}", id, index + 1)));
        }
    }

    step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::entities::StepId;

    #[test]
    fn test_parse_plan_in_prose() {
        let response = r#"
Here's my plan:

```json
{
  "description": "Introduce a cache layer",
  "steps": [
    {"id": "step_1", "description": "Design cache", "dependencies": [], "effort": "small",
     "validation": "Design reviewed"},
    {"id": "step_2", "description": "Implement", "dependencies": ["step_1"], "effort": "large",
     "sub_steps": [{"description": "write struct"}]},
    {"id": "step_3", "description": "Test", "dependencies": ["step_2", "step_9"]}
  ],
  "risks": ["stale reads"]
}
```
"#;

        let plan = parse_plan("Add caching", response);
        assert_eq!(plan.goal, "Add caching");
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[0].effort, EffortTier::Small);
        assert_eq!(plan.steps[0].validation, "Design reviewed");
        assert_eq!(plan.steps[1].dependencies, vec![StepId::new("step_1")]);
        assert_eq!(plan.steps[1].sub_steps[0].id.as_str(), "step_2.1");
        // unknown dependency pruned
        assert_eq!(plan.steps[2].dependencies, vec![StepId::new("step_2")]);
        assert_eq!(plan.risks, vec!["stale reads"]);
    }

    #[test]
    fn test_plain_text_falls_back_to_single_step() {
        let plan = parse_plan("Fix login", "I would start by reading the code.");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].description, "Fix login");
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let plan = parse_plan("Fix login", r#"{"steps": [ {"id": 1, "description": "x" "#);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].description, "Fix login");
    }

    #[test]
    fn test_empty_steps_falls_back() {
        let plan = parse_plan("Goal", r#"{"steps": []}"#);
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn test_numeric_and_missing_ids() {
        let plan = parse_plan(
            "g",
            r#"{"steps": [{"id": 1, "description": "a"}, {"description": "b", "depends_on": [1]}]}"#,
        );
        assert_eq!(plan.steps[0].id.as_str(), "1");
        assert_eq!(plan.steps[1].id.as_str(), "step_2");
        assert_eq!(plan.steps[1].dependencies, vec![StepId::new("1")]);
    }
}
