//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;

/// Errors emitted by answer graders.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GradingError {
    #[error("answer grading is not configured")]
    Disabled,
    #[error("grader returned an empty response")]
    EmptyResponse,
    #[error("grader response had an unexpected shape")]
    UnexpectedResponse,
    #[error("grader request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the study session controller.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("select at least one category")]
    NoSelection,
    #[error("no questions left in this session")]
    Completed,
    #[error("an answer is already being graded")]
    AnswerInFlight,
    #[error("no answer is waiting for a grade")]
    NoPendingSubmission,
    #[error("no question has been presented")]
    NotPresented,
    #[error("choose an option before submitting")]
    EmptyAnswer,
    #[error("no questions answered yet")]
    NoAnswers,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Grading(#[from] GradingError),
}
