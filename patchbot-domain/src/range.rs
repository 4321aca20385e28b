//! Upper-bound extraction from free-text vulnerable-version ranges.
//!
//! This is a textual heuristic, not a range evaluator: the first token after a `<`
//! is taken as the version that leaves the vulnerable range. For multi-range advisories
//! (`< 1.2.0 || >= 2.0.0, < 2.0.4`) only the first clause counts, and the returned
//! bound may itself fall in a later vulnerable sub-range.

use regex::Regex;
use std::sync::OnceLock;

/// Return the first upper-bound token following a less-than operator.
///
/// Tokens start with an alphanumeric and continue with alphanumerics, dots, or hyphens,
/// so `<= 1.2.3` does not produce a bound.
pub fn upper_bound(range: &str) -> Option<&str> {
    static UPPER_BOUND: OnceLock<Regex> = OnceLock::new();
    let re = UPPER_BOUND.get_or_init(|| {
        Regex::new(r"<\s*([0-9A-Za-z][0-9A-Za-z.\-]*)").expect("valid upper bound regex")
    });
    re.captures(range)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
