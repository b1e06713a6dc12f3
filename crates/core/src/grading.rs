//! Deterministic answer checks used when no remote grader is available.

use std::collections::HashSet;

/// Share of expected tokens a free-response answer must cover to pass the fallback check.
pub const TOKEN_OVERLAP_THRESHOLD: f64 = 0.6;

/// Trimmed, lowercased form used for comparisons.
#[must_use]
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Case-insensitive match after trimming surrounding whitespace.
///
/// ```
/// # use study_core::grading::exact_match;
/// assert!(exact_match("Paris ", "paris"));
/// assert!(!exact_match("Lyon", "paris"));
/// ```
#[must_use]
pub fn exact_match(user_answer: &str, correct_answer: &str) -> bool {
    normalize_answer(user_answer) == normalize_answer(correct_answer)
}

/// Fraction of the user's whitespace-separated tokens that occur in the
/// expected answer, relative to the expected answer's token count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn token_overlap(user_answer: &str, correct_answer: &str) -> f64 {
    let user = normalize_answer(user_answer);
    let expected = normalize_answer(correct_answer);
    let expected_tokens: Vec<&str> = expected.split_whitespace().collect();
    let expected_set: HashSet<&str> = expected_tokens.iter().copied().collect();

    let common = user
        .split_whitespace()
        .filter(|token| expected_set.contains(token))
        .count();
    common as f64 / expected_tokens.len().max(1) as f64
}

/// Local verdict: exact match, or enough token overlap.
#[must_use]
pub fn fallback_grade(user_answer: &str, correct_answer: &str) -> bool {
    if user_answer.trim().is_empty() {
        return false;
    }
    exact_match(user_answer, correct_answer)
        || token_overlap(user_answer, correct_answer) > TOKEN_OVERLAP_THRESHOLD
}
