#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod grading;
pub mod preferences_service;
pub mod progress_store;
pub mod sessions;

pub use study_core::Clock;

pub use app_services::StudyServices;
pub use error::{AppServicesError, GradingError, SessionError};
pub use grading::{AnswerGrader, GeminiConfig, GeminiGrader, GradeOutcome, GradeSource, GradingService};
pub use preferences_service::PreferencesService;
pub use progress_store::ProgressStore;
pub use sessions::{
    AnswerFeedback, CategoryResult, PresentedQuestion, SessionProgress, SessionResults,
    StudyLoopService, StudySession, Submission,
};
