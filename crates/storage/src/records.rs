//! JSON blob shapes for saved progress and preferences.
//!
//! Every field is defaulted on read so older or partial blobs still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use study_core::model::{
    CategoryPerformance, CategoryStats, Preferences, PreferencesDraft, SessionSnapshot,
};

use crate::repository::StorageError;

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryStatsRecord {
    pub correct: u32,
    pub incorrect: u32,
    pub times: Vec<f64>,
    pub total_time: f64,
    pub mastery: f64,
    pub is_mastered: bool,
}

impl From<&CategoryStats> for CategoryStatsRecord {
    fn from(stats: &CategoryStats) -> Self {
        Self {
            correct: stats.correct,
            incorrect: stats.incorrect,
            times: stats.response_times.clone(),
            total_time: stats.total_time_secs,
            mastery: stats.mastery,
            is_mastered: stats.is_mastered,
        }
    }
}

impl From<CategoryStatsRecord> for CategoryStats {
    fn from(record: CategoryStatsRecord) -> Self {
        Self {
            correct: record.correct,
            incorrect: record.incorrect,
            response_times: record.times,
            total_time_secs: record.total_time,
            mastery: record.mastery,
            is_mastered: record.is_mastered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryPerformanceRecord {
    pub consecutive_correct: u32,
    pub time_within_limit: u32,
    pub total_attempts: u32,
    pub recent_results: Vec<bool>,
    pub recent_time_results: Vec<bool>,
    pub mastery_score: f64,
}

impl From<&CategoryPerformance> for CategoryPerformanceRecord {
    fn from(perf: &CategoryPerformance) -> Self {
        Self {
            consecutive_correct: perf.consecutive_correct(),
            time_within_limit: perf.time_within_limit(),
            total_attempts: perf.total_attempts(),
            recent_results: perf.recent_results().iter().copied().collect(),
            recent_time_results: perf.recent_time_results().iter().copied().collect(),
            mastery_score: perf.mastery_score(),
        }
    }
}

impl From<CategoryPerformanceRecord> for CategoryPerformance {
    fn from(record: CategoryPerformanceRecord) -> Self {
        CategoryPerformance::from_persisted(
            record.consecutive_correct,
            record.time_within_limit,
            record.total_attempts,
            record.recent_results,
            record.recent_time_results,
            record.mastery_score,
        )
    }
}

/// Saved session progress.
///
/// `timestamp` is epoch milliseconds of the save; blobs without one never
/// expire. `questionOrder` lists catalog indices of the queue; older blobs
/// without it resume in catalog order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressRecord {
    pub current_question_index: usize,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub total_time: f64,
    pub question_times: Vec<f64>,
    pub categories: BTreeMap<String, CategoryStatsRecord>,
    pub category_performance: BTreeMap<String, CategoryPerformanceRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub question_order: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot, saved_at: DateTime<Utc>) -> Self {
        Self {
            current_question_index: snapshot.current_index,
            correct_answers: snapshot.correct_answers,
            incorrect_answers: snapshot.incorrect_answers,
            total_time: snapshot.total_time_secs,
            question_times: snapshot.response_times.clone(),
            categories: snapshot
                .categories
                .iter()
                .map(|(name, stats)| (name.clone(), stats.into()))
                .collect(),
            category_performance: snapshot
                .performance
                .iter()
                .map(|(name, perf)| (name.clone(), perf.into()))
                .collect(),
            question_order: snapshot.question_order.clone(),
            timestamp: Some(saved_at.timestamp_millis()),
        }
    }

    #[must_use]
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }

    #[must_use]
    pub fn into_snapshot(self) -> SessionSnapshot {
        let saved_at = self.saved_at();
        SessionSnapshot {
            current_index: self.current_question_index,
            correct_answers: self.correct_answers,
            incorrect_answers: self.incorrect_answers,
            total_time_secs: self.total_time,
            response_times: self.question_times,
            categories: self
                .categories
                .into_iter()
                .map(|(name, record)| (name, record.into()))
                .collect(),
            performance: self
                .category_performance
                .into_iter()
                .map(|(name, record)| (name, record.into()))
                .collect(),
            question_order: self.question_order,
            saved_at,
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

//
// ─── PREFERENCES ───────────────────────────────────────────────────────────────
//

/// Saved preferences. Missing or out-of-range values are fixed up on load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreferencesRecord {
    pub is_dark_mode: Option<bool>,
    pub use_time_scoring: Option<bool>,
    pub use_adaptive_mastery: Option<bool>,
    pub required_correct_answers: Option<i64>,
}

impl From<&Preferences> for PreferencesRecord {
    fn from(prefs: &Preferences) -> Self {
        Self {
            is_dark_mode: Some(prefs.dark_mode()),
            use_time_scoring: Some(prefs.time_scoring()),
            use_adaptive_mastery: Some(prefs.adaptive_mastery()),
            required_correct_answers: Some(i64::from(prefs.required_streak())),
        }
    }
}

impl PreferencesRecord {
    #[must_use]
    pub fn into_draft(self) -> PreferencesDraft {
        PreferencesDraft {
            dark_mode: self.is_dark_mode,
            time_scoring: self.use_time_scoring,
            adaptive_mastery: self.use_adaptive_mastery,
            required_streak: self.required_correct_answers,
        }
    }

    #[must_use]
    pub fn into_preferences(self) -> Preferences {
        self.into_draft().normalize()
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|err| StorageError::Serialization(err.to_string()))
    }
}
