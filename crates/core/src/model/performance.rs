use std::collections::VecDeque;

/// Number of most recent attempts kept in the rolling windows.
pub const RECENT_WINDOW: usize = 10;

const ACCURACY_WEIGHT: f64 = 0.7;
const TIME_WEIGHT: f64 = 0.3;
const STREAK_BONUS_PER_ANSWER: f64 = 2.0;
const MAX_STREAK_BONUS: f64 = 20.0;

/// Rolling-window performance for one category.
///
/// Both windows always hold the same number of entries, at most
/// [`RECENT_WINDOW`], oldest first. The streak counts answers that were
/// correct *and* within the target time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryPerformance {
    consecutive_correct: u32,
    time_within_limit: u32,
    total_attempts: u32,
    recent_results: VecDeque<bool>,
    recent_time_results: VecDeque<bool>,
    mastery_score: f64,
}

impl CategoryPerformance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from persisted values.
    ///
    /// Windows longer than [`RECENT_WINDOW`] keep their newest entries, and
    /// windows of unequal length are cut to the shorter one. A non-finite or
    /// out-of-range score is clamped into `[0, 100]`.
    #[must_use]
    pub fn from_persisted(
        consecutive_correct: u32,
        time_within_limit: u32,
        total_attempts: u32,
        recent_results: Vec<bool>,
        recent_time_results: Vec<bool>,
        mastery_score: f64,
    ) -> Self {
        let keep = recent_results
            .len()
            .min(recent_time_results.len())
            .min(RECENT_WINDOW);
        let tail = |values: Vec<bool>| -> VecDeque<bool> {
            let skip = values.len() - keep;
            values.into_iter().skip(skip).collect()
        };

        Self {
            consecutive_correct,
            time_within_limit,
            total_attempts,
            recent_results: tail(recent_results),
            recent_time_results: tail(recent_time_results),
            mastery_score: clamp_score(mastery_score),
        }
    }

    /// Record one answered question and recompute the mastery score.
    pub fn record_attempt(&mut self, is_correct: bool, is_within_time_limit: bool) {
        self.total_attempts = self.total_attempts.saturating_add(1);

        if is_correct && is_within_time_limit {
            self.consecutive_correct = self.consecutive_correct.saturating_add(1);
            self.time_within_limit = self.time_within_limit.saturating_add(1);
        } else {
            self.consecutive_correct = 0;
        }

        push_bounded(&mut self.recent_results, is_correct);
        push_bounded(&mut self.recent_time_results, is_within_time_limit);

        self.mastery_score = self.compute_score();
    }

    /// Pin the score at 100 once the category is mastered.
    pub fn force_mastered(&mut self) {
        self.mastery_score = 100.0;
    }

    fn compute_score(&self) -> f64 {
        if self.recent_results.is_empty() {
            return self.mastery_score;
        }
        let accuracy = share_true(&self.recent_results);
        let timeliness = share_true(&self.recent_time_results);
        let base = accuracy * ACCURACY_WEIGHT + timeliness * TIME_WEIGHT;
        let bonus = (f64::from(self.consecutive_correct) * STREAK_BONUS_PER_ANSWER)
            .min(MAX_STREAK_BONUS);
        clamp_score(base + bonus)
    }

    #[must_use]
    pub fn consecutive_correct(&self) -> u32 {
        self.consecutive_correct
    }

    /// Lifetime count of correct answers given within the time limit.
    #[must_use]
    pub fn time_within_limit(&self) -> u32 {
        self.time_within_limit
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    #[must_use]
    pub fn recent_results(&self) -> &VecDeque<bool> {
        &self.recent_results
    }

    #[must_use]
    pub fn recent_time_results(&self) -> &VecDeque<bool> {
        &self.recent_time_results
    }

    /// Blended score in `[0, 100]`.
    #[must_use]
    pub fn mastery_score(&self) -> f64 {
        self.mastery_score
    }
}

fn push_bounded(window: &mut VecDeque<bool>, value: bool) {
    window.push_back(value);
    while window.len() > RECENT_WINDOW {
        window.pop_front();
    }
}

#[allow(clippy::cast_precision_loss)]
fn share_true(window: &VecDeque<bool>) -> f64 {
    let hits = window.iter().filter(|hit| **hit).count();
    hits as f64 / window.len() as f64 * 100.0
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Advisory per-answer time score.
///
/// 100 when time scoring is off or the answer met its target, 0 at twice
/// the target or slower, linear in between.
#[must_use]
pub fn time_score(elapsed_secs: f64, target_secs: u32, time_scoring: bool) -> f64 {
    let target = f64::from(target_secs);
    if !time_scoring || target <= 0.0 || elapsed_secs <= target {
        return 100.0;
    }
    let ratio = elapsed_secs / target;
    if ratio >= 2.0 {
        return 0.0;
    }
    (100.0 - (ratio - 1.0) * 100.0).max(0.0)
}
