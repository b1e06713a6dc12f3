use thiserror::Error;

pub const DEFAULT_REQUIRED_STREAK: u32 = 10;
pub const MIN_REQUIRED_STREAK: u32 = 5;
pub const MAX_REQUIRED_STREAK: u32 = 30;

pub const DEFAULT_MIN_ACCURACY: f64 = 85.0;
pub const DEFAULT_MAX_TIME_OVER_TARGET: f64 = 1.5;

//
// ─── PREFERENCES ───────────────────────────────────────────────────────────────
//

/// App-wide user preferences.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Preferences {
    dark_mode: bool,
    time_scoring: bool,
    adaptive_mastery: bool,
    required_streak: u32,
}

/// Partially specified preferences, e.g. read from an older persisted blob.
#[derive(Clone, Debug, Default)]
pub struct PreferencesDraft {
    pub dark_mode: Option<bool>,
    pub time_scoring: Option<bool>,
    pub adaptive_mastery: Option<bool>,
    pub required_streak: Option<i64>,
}

impl PreferencesDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill missing values with defaults and clamp the streak into range.
    #[must_use]
    pub fn normalize(self) -> Preferences {
        let defaults = Preferences::default();
        Preferences {
            dark_mode: self.dark_mode.unwrap_or(defaults.dark_mode),
            time_scoring: self.time_scoring.unwrap_or(defaults.time_scoring),
            adaptive_mastery: self.adaptive_mastery.unwrap_or(defaults.adaptive_mastery),
            required_streak: self
                .required_streak
                .map_or(defaults.required_streak, clamp_streak),
        }
    }
}

impl Preferences {
    #[must_use]
    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    #[must_use]
    pub fn time_scoring(&self) -> bool {
        self.time_scoring
    }

    #[must_use]
    pub fn adaptive_mastery(&self) -> bool {
        self.adaptive_mastery
    }

    /// Consecutive correct, on-time answers needed for adaptive mastery.
    #[must_use]
    pub fn required_streak(&self) -> u32 {
        self.required_streak
    }

    #[must_use]
    pub fn with_dark_mode(mut self, on: bool) -> Self {
        self.dark_mode = on;
        self
    }

    #[must_use]
    pub fn with_time_scoring(mut self, on: bool) -> Self {
        self.time_scoring = on;
        self
    }

    #[must_use]
    pub fn with_adaptive_mastery(mut self, on: bool) -> Self {
        self.adaptive_mastery = on;
        self
    }

    /// Set the required streak, clamped into `[5, 30]`.
    #[must_use]
    pub fn with_required_streak(mut self, streak: i64) -> Self {
        self.required_streak = clamp_streak(streak);
        self
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            time_scoring: true,
            adaptive_mastery: true,
            required_streak: DEFAULT_REQUIRED_STREAK,
        }
    }
}

fn clamp_streak(value: i64) -> u32 {
    let clamped = value.clamp(i64::from(MIN_REQUIRED_STREAK), i64::from(MAX_REQUIRED_STREAK));
    u32::try_from(clamped).unwrap_or(DEFAULT_REQUIRED_STREAK)
}

//
// ─── MASTERY THRESHOLDS ────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ThresholdsError {
    #[error("minimum accuracy must be in (0, 100], got {provided}")]
    InvalidMinAccuracy { provided: f64 },

    #[error("time-over-target ratio must be positive and finite, got {provided}")]
    InvalidTimeRatio { provided: f64 },
}

/// Limits for the aggregate mastery policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryThresholds {
    min_accuracy: f64,
    max_time_over_target: f64,
}

impl MasteryThresholds {
    /// # Errors
    ///
    /// Returns `ThresholdsError` if accuracy is outside `(0, 100]` or the
    /// time ratio is not a positive finite number.
    pub fn new(min_accuracy: f64, max_time_over_target: f64) -> Result<Self, ThresholdsError> {
        if !min_accuracy.is_finite() || min_accuracy <= 0.0 || min_accuracy > 100.0 {
            return Err(ThresholdsError::InvalidMinAccuracy {
                provided: min_accuracy,
            });
        }
        if !max_time_over_target.is_finite() || max_time_over_target <= 0.0 {
            return Err(ThresholdsError::InvalidTimeRatio {
                provided: max_time_over_target,
            });
        }
        Ok(Self {
            min_accuracy,
            max_time_over_target,
        })
    }

    /// Minimum accuracy percentage.
    #[must_use]
    pub fn min_accuracy(&self) -> f64 {
        self.min_accuracy
    }

    /// Allowed multiple of the category's average target time.
    #[must_use]
    pub fn max_time_over_target(&self) -> f64 {
        self.max_time_over_target
    }
}

impl Default for MasteryThresholds {
    fn default() -> Self {
        Self {
            min_accuracy: DEFAULT_MIN_ACCURACY,
            max_time_over_target: DEFAULT_MAX_TIME_OVER_TARGET,
        }
    }
}
