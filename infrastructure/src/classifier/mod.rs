//! Keyword-based task classifier
//!
//! A fast, local [`ClassifierClient`] that scores descriptions against
//! per-type keyword patterns. Used when no remote classifier is configured.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use taskforge_application::ports::classifier::{ClassifierClient, ClassifierError};
use taskforge_domain::{Classification, TaskComplexity, TaskType};
use tracing::debug;

const TYPE_KEYWORDS: &[(TaskType, &[&str])] = &[
    (
        TaskType::BugFix,
        &[
            r"\bbug\b",
            r"\berror\b",
            r"\bfix\b",
            r"\bcrash\b",
            r"\bissue\b",
            r"\bfail(s|ing|ed)?\b",
            r"\bbroken\b",
            r"\bdefect\b",
            r"\bproblem\b",
            r"\bincorrect\b",
        ],
    ),
    (
        TaskType::Feature,
        &[
            r"\badd\b",
            r"\bimplement\b",
            r"\bcreate\b",
            r"\bnew\b",
            r"\bfeature\b",
            r"\benhance\b",
            r"\bsupport\b",
            r"\bintroduce\b",
            r"\bextend\b",
            r"\bbuild\b",
        ],
    ),
    (
        TaskType::Refactor,
        &[
            r"\brefactor\b",
            r"\bclean\b",
            r"\boptimize\b",
            r"\bimprove\b",
            r"\breorganize\b",
            r"\brestructure\b",
            r"\bsimplify\b",
            r"\bmodernize\b",
            r"\bupgrade\b",
        ],
    ),
    (
        TaskType::Test,
        &[
            r"\btest\b",
            r"\bunit test\b",
            r"\bintegration test\b",
            r"\bcoverage\b",
            r"\bspec\b",
            r"\bvalidate\b",
            r"\bverify\b",
            r"\bmock\b",
            r"\bassertion\b",
        ],
    ),
    (
        TaskType::Documentation,
        &[
            r"\bdoc(s|umentation)?\b",
            r"\breadme\b",
            r"\bcomment\b",
            r"\bexplain\b",
            r"\bdescribe\b",
            r"\bguide\b",
            r"\btutorial\b",
            r"\bexample\b",
            r"\bannotate\b",
        ],
    ),
    (
        TaskType::Deployment,
        &[
            r"\bdeploy\b",
            r"\brelease\b",
            r"\bci/cd\b",
            r"\bpipeline\b",
            r"\bdocker\b",
            r"\bkubernetes\b",
            r"\bhelm\b",
            r"\bcontainer\b",
            r"\binfrastructure\b",
        ],
    ),
];

const SIMPLE_KEYWORDS: &[&str] = &[
    r"\bsmall\b",
    r"\bquick\b",
    r"\bminor\b",
    r"\btrivial\b",
    r"\btypo\b",
    r"\bone[ -]line\b",
    r"\bsimple\b",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    r"\bcomplex\b",
    r"\bmajor\b",
    r"\barchitecture\b",
    r"\brewrite\b",
    r"\bmigration\b",
    r"\brefactor all\b",
    r"\blarge[ -]scale\b",
    r"\bentire\b",
    r"\bsystem[ -]wide\b",
];

const EPIC_KEYWORDS: &[&str] = &[
    r"\bplatform\b",
    r"\bmulti[ -]service\b",
    r"\bfrom scratch\b",
    r"\bend[ -]to[ -]end\b",
    r"\bmonorepo\b",
];

const NO_MATCH_CONFIDENCE: f64 = 0.3;
const UNIQUE_BOOST: f64 = 0.2;
const UNIQUE_CAP: f64 = 0.95;
const SHARED_CAP: f64 = 0.85;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
        .collect()
}

fn count_matches(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(text)).count()
}

/// Regex keyword classifier.
pub struct HeuristicClassifier {
    types: Vec<(TaskType, Vec<Regex>)>,
    simple: Vec<Regex>,
    complex: Vec<Regex>,
    epic: Vec<Regex>,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self {
            types: TYPE_KEYWORDS
                .iter()
                .map(|(task_type, patterns)| (*task_type, compile(patterns)))
                .collect(),
            simple: compile(SIMPLE_KEYWORDS),
            complex: compile(COMPLEX_KEYWORDS),
            epic: compile(EPIC_KEYWORDS),
        }
    }

    /// Classify synchronously.
    pub fn classify_text(&self, description: &str) -> Classification {
        let complexity = self.complexity(description);

        let matches: Vec<(TaskType, usize)> = self
            .types
            .iter()
            .map(|(task_type, patterns)| (*task_type, count_matches(patterns, description)))
            .filter(|(_, count)| *count > 0)
            .collect();

        // Ties go to the earlier type in the keyword table.
        let Some((task_type, best)) = matches
            .iter()
            .copied()
            .fold(None, |best: Option<(TaskType, usize)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            })
        else {
            return Classification::new(TaskType::Feature, complexity, NO_MATCH_CONFIDENCE)
                .with_reasoning("No keyword matches found, defaulting to Feature");
        };

        let total: usize = matches.iter().map(|(_, count)| count).sum();
        let base = best as f64 / total as f64;
        let confidence = if matches.len() == 1 {
            (base + UNIQUE_BOOST).min(UNIQUE_CAP)
        } else {
            base.min(SHARED_CAP)
        };

        debug!(
            task_type = %task_type,
            complexity = %complexity,
            confidence,
            "Heuristic classification"
        );

        Classification::new(task_type, complexity, confidence).with_reasoning(format!(
            "Matched {} keyword(s) for {}",
            best, task_type
        ))
    }

    fn complexity(&self, description: &str) -> TaskComplexity {
        if count_matches(&self.epic, description) > 0 {
            return TaskComplexity::Epic;
        }
        if count_matches(&self.complex, description) > 0 {
            return TaskComplexity::Complex;
        }
        if count_matches(&self.simple, description) > 0 {
            return TaskComplexity::Simple;
        }
        match description.split_whitespace().count() {
            n if n < 20 => TaskComplexity::Simple,
            n if n > 100 => TaskComplexity::Complex,
            _ => TaskComplexity::Medium,
        }
    }
}

#[async_trait]
impl ClassifierClient for HeuristicClassifier {
    async fn classify(&self, description: &str) -> Result<Classification, ClassifierError> {
        Ok(self.classify_text(description))
    }
}
