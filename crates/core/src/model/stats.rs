/// Aggregate, whole-session statistics for one category.
///
/// `mastery` is the aggregate-policy mastery percentage (raw accuracy), or
/// 100 once the adaptive policy grants mastery. `is_mastered` never flips
/// back to false within a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryStats {
    pub correct: u32,
    pub incorrect: u32,
    pub response_times: Vec<f64>,
    pub total_time_secs: f64,
    pub mastery: f64,
    pub is_mastered: bool,
}

impl CategoryStats {
    /// Count one answer and its response time.
    pub fn record(&mut self, is_correct: bool, elapsed_secs: f64) {
        if is_correct {
            self.correct = self.correct.saturating_add(1);
        } else {
            self.incorrect = self.incorrect.saturating_add(1);
        }
        self.response_times.push(elapsed_secs);
        self.total_time_secs += elapsed_secs;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.correct.saturating_add(self.incorrect)
    }

    /// Accuracy as a percentage, `None` before the first answer.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        let attempts = self.attempts();
        (attempts > 0).then(|| f64::from(self.correct) / f64::from(attempts) * 100.0)
    }

    /// Mean response time in seconds, `None` before the first answer.
    #[must_use]
    pub fn average_time_secs(&self) -> Option<f64> {
        let attempts = self.attempts();
        (attempts > 0).then(|| self.total_time_secs / f64::from(attempts))
    }
}
