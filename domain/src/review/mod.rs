//! Reviewer and self-critique verdicts
//!
//! Pure parsing of free-form model output into structured verdicts. JSON is
//! preferred; keyword heuristics are the fallback.

pub mod critique;
pub mod verdict;

pub use critique::{Critique, parse_critique};
pub use verdict::{BLOCKING_SEVERITY, MAX_SEVERITY, MIN_SEVERITY, ReviewVerdict, parse_review};
