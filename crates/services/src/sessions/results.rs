use study_core::mastery::MasteryPolicy;
use study_core::model::{Catalog, SessionState};

use crate::error::SessionError;

/// Per-category line of the results screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub name: String,
    pub attempts: u32,
    pub correct: u32,
    pub accuracy: f64,
    pub average_time_secs: f64,
    pub average_target_secs: f64,
    pub streak: u32,
    /// Streak needed for mastery; `None` under the aggregate policy.
    pub required_streak: Option<u32>,
    pub is_mastered: bool,
    /// 100 for mastered categories, the rolling score otherwise.
    pub mastery: f64,
}

/// Summary shown when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResults {
    pub answered: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub accuracy: f64,
    pub average_time_secs: f64,
    pub overall_mastery: f64,
    pub mastered_categories: usize,
    pub categories: Vec<CategoryResult>,
}

impl SessionResults {
    /// Build results for every category with at least one attempt, in
    /// catalog order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoAnswers` if nothing was answered.
    pub fn build(
        catalog: &Catalog,
        state: &SessionState,
        policy: MasteryPolicy,
    ) -> Result<Self, SessionError> {
        let answered = state.answered();
        if answered == 0 {
            return Err(SessionError::NoAnswers);
        }

        let required_streak = match policy {
            MasteryPolicy::Adaptive { required_streak } => Some(required_streak),
            MasteryPolicy::Aggregate(_) => None,
        };

        let categories: Vec<CategoryResult> = catalog
            .categories()
            .iter()
            .filter_map(|name| {
                let stats = state.stats(name)?;
                let accuracy = stats.accuracy()?;
                let perf = state.performance(name);
                let rolling = perf.map_or(0.0, |p| p.mastery_score());
                Some(CategoryResult {
                    name: name.clone(),
                    attempts: stats.attempts(),
                    correct: stats.correct,
                    accuracy,
                    average_time_secs: stats.average_time_secs().unwrap_or(0.0),
                    average_target_secs: catalog.average_target_secs(name).unwrap_or(0.0),
                    streak: perf.map_or(0, |p| p.consecutive_correct()),
                    required_streak,
                    is_mastered: stats.is_mastered,
                    mastery: if stats.is_mastered { 100.0 } else { rolling },
                })
            })
            .collect();

        let answered_f = f64::from(answered);
        Ok(Self {
            answered,
            correct: state.correct_answers(),
            incorrect: state.incorrect_answers(),
            accuracy: f64::from(state.correct_answers()) / answered_f * 100.0,
            average_time_secs: state.total_time_secs() / answered_f,
            overall_mastery: state.overall_mastery().unwrap_or(0.0),
            mastered_categories: categories.iter().filter(|c| c.is_mastered).count(),
            categories,
        })
    }
}
