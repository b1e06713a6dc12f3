mod catalog;
mod keys;
mod performance;
mod question;
mod session;
mod settings;
mod stats;

pub use catalog::{Catalog, CatalogError, LoadedCatalog, QuestionKind, RawQuestionRow, SkippedRow};
pub use keys::{
    ANONYMOUS_PROGRESS_PREFIX, PREFERENCES_KEY, SessionKey, USER_PROGRESS_PREFIX, UserId,
    is_progress_key, progress_key,
};
pub use performance::{CategoryPerformance, RECENT_WINDOW, time_score};
pub use question::{
    DEFAULT_CATEGORY, DEFAULT_TARGET_SECS, Difficulty, Question, QuestionDraft, QuestionError,
};
pub use session::{CategorySelection, SessionSnapshot, SessionState};
pub use settings::{
    DEFAULT_REQUIRED_STREAK, MAX_REQUIRED_STREAK, MIN_REQUIRED_STREAK, MasteryThresholds,
    Preferences, PreferencesDraft, ThresholdsError,
};
pub use stats::CategoryStats;
