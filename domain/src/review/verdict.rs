//! Reviewer verdict for a coder-produced step artifact.

use crate::core::json::extract_first_json_object;
use serde::{Deserialize, Serialize};

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 5;
/// Verdicts at or above this severity fail the reviewed step.
pub const BLOCKING_SEVERITY: u8 = 4;

/// Structured reviewer output (value object).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVerdict {
    pub is_approved: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    /// 1 (cosmetic) ..= 5 (broken)
    pub severity: u8,
}

impl ReviewVerdict {
    pub fn new(is_approved: bool, severity: u8) -> Self {
        Self {
            is_approved,
            issues: Vec::new(),
            suggestions: Vec::new(),
            severity: severity.clamp(MIN_SEVERITY, MAX_SEVERITY),
        }
    }

    pub fn approved() -> Self {
        Self::new(true, MIN_SEVERITY)
    }

    pub fn rejected(severity: u8) -> Self {
        Self::new(false, severity)
    }

    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Severity decides the outcome; `is_approved` is advisory.
    pub fn blocks(&self) -> bool {
        self.severity >= BLOCKING_SEVERITY
    }
}

/// Parse a reviewer response.
///
/// 1. The first JSON object carrying `severity` or an approval flag.
/// 2. APPROVE / REJECT keywords, conservative when ambiguous.
pub fn parse_review(response: &str) -> ReviewVerdict {
    if let Some(json) = extract_first_json_object(response)
        && let Some(verdict) = verdict_from_json(&json)
    {
        return verdict;
    }

    let upper = response.to_uppercase();
    let approved = upper.contains("APPROVE")
        && !upper.contains("NOT APPROVE")
        && !upper.contains("DON'T APPROVE")
        && !upper.contains("CANNOT APPROVE");
    let rejected = upper.contains("REJECT")
        || upper.contains("REVISE")
        || upper.contains("NOT APPROVE")
        || upper.contains("CANNOT APPROVE");

    if approved && !rejected {
        ReviewVerdict::approved()
    } else {
        let summary = response.trim();
        let issues = if summary.is_empty() {
            vec!["reviewer returned no verdict".to_string()]
        } else {
            vec![summary.to_string()]
        };
        ReviewVerdict::rejected(BLOCKING_SEVERITY).with_issues(issues)
    }
}

fn verdict_from_json(json: &serde_json::Value) -> Option<ReviewVerdict> {
    let approved = ["isApproved", "is_approved", "approved"]
        .iter()
        .find_map(|key| json.get(*key))
        .and_then(|v| v.as_bool());
    let severity = json.get("severity").and_then(severity_value);

    if approved.is_none() && severity.is_none() {
        return None;
    }

    let is_approved = approved.unwrap_or_else(|| severity.is_some_and(|s| s < BLOCKING_SEVERITY));
    let severity = severity.unwrap_or(if is_approved {
        MIN_SEVERITY
    } else {
        BLOCKING_SEVERITY
    });

    Some(
        ReviewVerdict::new(is_approved, severity)
            .with_issues(string_list(json.get("issues")))
            .with_suggestions(string_list(json.get("suggestions"))),
    )
}

fn severity_value(value: &serde_json::Value) -> Option<u8> {
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(raw.round().clamp(MIN_SEVERITY as f64, MAX_SEVERITY as f64) as u8)
}

/// Strings, or objects with a `description` / `message` field.
pub(crate) fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    let Some(items) = value.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Object(map) => ["description", "message", "issue"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_verdict_in_prose() {
        let response = r#"Looks mostly fine.
```json
{"isApproved": true, "issues": [], "suggestions": ["rename x"], "severity": 2}
```"#;
        let verdict = parse_review(response);
        assert!(verdict.is_approved);
        assert_eq!(verdict.severity, 2);
        assert_eq!(verdict.suggestions, vec!["rename x"]);
        assert!(!verdict.blocks());
    }

    #[test]
    fn test_severity_decides_blocking() {
        let verdict = parse_review(r#"{"isApproved": true, "severity": 5, "issues": ["panics"]}"#);
        assert!(verdict.blocks());

        let verdict = parse_review(r#"{"isApproved": false, "severity": 3}"#);
        assert!(!verdict.blocks());
    }

    #[test]
    fn test_severity_is_clamped() {
        assert_eq!(parse_review(r#"{"severity": 9}"#).severity, MAX_SEVERITY);
        assert_eq!(parse_review(r#"{"severity": "0"}"#).severity, MIN_SEVERITY);
    }

    #[test]
    fn test_missing_severity_follows_approval() {
        let verdict = parse_review(r#"{"approved": false, "issues": [{"description": "no tests"}]}"#);
        assert_eq!(verdict.severity, BLOCKING_SEVERITY);
        assert_eq!(verdict.issues, vec!["no tests"]);
    }

    #[test]
    fn test_keyword_fallback() {
        assert!(!parse_review("APPROVE. Nice work.").blocks());
        assert!(parse_review("REJECT: the loop never ends").blocks());
        assert!(parse_review("I cannot approve this").blocks());
        // ambiguous text is conservative
        assert!(parse_review("hmm").blocks());
    }
}
