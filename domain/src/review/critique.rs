//! Self-critique verdict used by the iterative strategy.

use super::verdict::string_list;
use crate::core::json::extract_first_json_object;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    pub issues_remain: bool,
    pub issues: Vec<String>,
}

impl Critique {
    pub fn clean() -> Self {
        Self {
            issues_remain: false,
            issues: Vec::new(),
        }
    }
}

/// Parse `{"issues_remain": bool, "issues": [...]}`.
///
/// Falls back to phrases like "no issues"; anything unrecognised counts as
/// issues remaining so the refinement budget, not the parser, ends the loop.
pub fn parse_critique(response: &str) -> Critique {
    if let Some(json) = extract_first_json_object(response)
        && let Some(remain) = ["issues_remain", "issuesRemain"]
            .iter()
            .find_map(|key| json.get(*key))
            .and_then(|v| v.as_bool())
    {
        return Critique {
            issues_remain: remain,
            issues: string_list(json.get("issues")),
        };
    }

    let lower = response.to_lowercase();
    let clean = ["no issues", "no further issues", "no remaining issues", "lgtm"]
        .iter()
        .any(|phrase| lower.contains(phrase));

    if clean {
        Critique::clean()
    } else {
        Critique {
            issues_remain: true,
            issues: vec![response.trim().to_string()],
        }
    }
}
