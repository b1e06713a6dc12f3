use crate::model::{CategoryPerformance, CategoryStats, MasteryThresholds, Preferences};

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// How a category earns mastery.
///
/// * `Adaptive` - a streak of consecutive correct, on-time answers.
/// * `Aggregate` - whole-session accuracy and average response time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MasteryPolicy {
    Adaptive { required_streak: u32 },
    Aggregate(MasteryThresholds),
}

impl MasteryPolicy {
    /// Select the policy from user preferences.
    #[must_use]
    pub fn from_preferences(preferences: &Preferences, thresholds: MasteryThresholds) -> Self {
        if preferences.adaptive_mastery() {
            Self::Adaptive {
                required_streak: preferences.required_streak(),
            }
        } else {
            Self::Aggregate(thresholds)
        }
    }

    #[must_use]
    pub fn is_adaptive(&self) -> bool {
        matches!(self, Self::Adaptive { .. })
    }
}

//
// ─── GATE ──────────────────────────────────────────────────────────────────────
//

/// Decides when a category becomes mastered.
///
/// Mastery is sticky: once `CategoryStats::is_mastered` is set, evaluation
/// returns true without looking at the numbers again.
///
/// # Examples
///
/// ```
/// # use study_core::mastery::{MasteryGate, MasteryPolicy};
/// # use study_core::model::{CategoryPerformance, CategoryStats};
/// let gate = MasteryGate::new(MasteryPolicy::Adaptive { required_streak: 5 });
/// let mut stats = CategoryStats::default();
/// let mut perf = CategoryPerformance::new();
/// for _ in 0..5 {
///     perf.record_attempt(true, true);
/// }
/// assert!(gate.evaluate(&mut stats, &mut perf, 30.0));
/// assert_eq!(stats.mastery, 100.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryGate {
    policy: MasteryPolicy,
}

impl MasteryGate {
    #[must_use]
    pub fn new(policy: MasteryPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> MasteryPolicy {
        self.policy
    }

    /// Evaluate one category, updating its mastery fields in place.
    ///
    /// `average_target_secs` is the mean target time of the category's
    /// questions; only the aggregate policy uses it.
    pub fn evaluate(
        &self,
        stats: &mut CategoryStats,
        performance: &mut CategoryPerformance,
        average_target_secs: f64,
    ) -> bool {
        if stats.is_mastered {
            return true;
        }

        match self.policy {
            MasteryPolicy::Adaptive { required_streak } => {
                if performance.consecutive_correct() >= required_streak {
                    stats.is_mastered = true;
                    stats.mastery = 100.0;
                    performance.force_mastered();
                    true
                } else {
                    false
                }
            }
            MasteryPolicy::Aggregate(thresholds) => {
                let (Some(accuracy), Some(average_time)) =
                    (stats.accuracy(), stats.average_time_secs())
                else {
                    return false;
                };
                stats.mastery = accuracy;
                stats.is_mastered = accuracy >= thresholds.min_accuracy()
                    && average_time <= average_target_secs * thresholds.max_time_over_target();
                stats.is_mastered
            }
        }
    }
}
