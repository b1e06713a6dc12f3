use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use study_core::grading::{exact_match, fallback_grade};
use study_core::model::Question;

use crate::error::GradingError;

mod gemini;

pub use gemini::{GeminiConfig, GeminiGrader};

/// Remote collaborator that judges a free-response answer.
#[async_trait]
pub trait AnswerGrader: Send + Sync {
    /// Return whether `user_answer` is conceptually equivalent to `correct_answer`.
    ///
    /// # Errors
    ///
    /// Returns `GradingError` when no verdict could be obtained.
    async fn grade(
        &self,
        user_answer: &str,
        correct_answer: &str,
        question: &str,
    ) -> Result<bool, GradingError>;
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeSource {
    /// Exact match after trimming and lowercasing; no grader call.
    ExactMatch,
    /// Blank answer; no grader call.
    EmptyAnswer,
    /// Multiple-choice option compared locally.
    Choice,
    /// Verdict from the remote grader.
    Grader,
    /// Local heuristic after the grader was unavailable or failed.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub is_correct: bool,
    pub source: GradeSource,
}

impl GradeOutcome {
    #[must_use]
    pub fn new(is_correct: bool, source: GradeSource) -> Self {
        Self { is_correct, source }
    }
}

/// Grades answers, always producing a verdict.
///
/// Free-response answers go to the configured grader unless a local shortcut
/// decides them first. Grader failures fall back to the token-overlap
/// heuristic so a session can always proceed.
#[derive(Clone, Default)]
pub struct GradingService {
    grader: Option<Arc<dyn AnswerGrader>>,
}

impl GradingService {
    #[must_use]
    pub fn new(grader: Option<Arc<dyn AnswerGrader>>) -> Self {
        Self { grader }
    }

    /// Grading service with only the local heuristics.
    #[must_use]
    pub fn local_only() -> Self {
        Self { grader: None }
    }

    /// Use the Gemini grader when `QUICKSTUDY_AI_API_KEY` is set.
    ///
    /// # Errors
    ///
    /// Returns `GradingError` if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, GradingError> {
        let grader = match GeminiConfig::from_env() {
            Some(config) => Some(Arc::new(GeminiGrader::new(config)?) as Arc<dyn AnswerGrader>),
            None => None,
        };
        Ok(Self { grader })
    }

    #[must_use]
    pub fn has_grader(&self) -> bool {
        self.grader.is_some()
    }

    /// Grade an answer to `question`, choosing the path by question kind.
    pub async fn grade(&self, question: &Question, answer: &str) -> GradeOutcome {
        if question.is_multiple_choice() {
            Self::grade_choice(answer, question.answer())
        } else {
            self.grade_free_response(answer, question.answer(), question.text())
                .await
        }
    }

    /// Compare a selected option with the correct one.
    #[must_use]
    pub fn grade_choice(selected: &str, correct_answer: &str) -> GradeOutcome {
        GradeOutcome::new(exact_match(selected, correct_answer), GradeSource::Choice)
    }

    pub async fn grade_free_response(
        &self,
        user_answer: &str,
        correct_answer: &str,
        question: &str,
    ) -> GradeOutcome {
        if exact_match(user_answer, correct_answer) {
            debug!("exact match, grader skipped");
            return GradeOutcome::new(true, GradeSource::ExactMatch);
        }
        if user_answer.trim().is_empty() {
            return GradeOutcome::new(false, GradeSource::EmptyAnswer);
        }

        match self.remote_verdict(user_answer, correct_answer, question).await {
            Ok(is_correct) => GradeOutcome::new(is_correct, GradeSource::Grader),
            Err(GradingError::Disabled) => {
                debug!("no grader configured, using local heuristic");
                Self::fallback(user_answer, correct_answer)
            }
            Err(err) => {
                warn!(error = %err, "grader failed, using local heuristic");
                Self::fallback(user_answer, correct_answer)
            }
        }
    }

    /// Ask the configured grader for a verdict, with no shortcuts or fallback.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::Disabled` when no grader is configured, or the
    /// grader's own error.
    pub async fn remote_verdict(
        &self,
        user_answer: &str,
        correct_answer: &str,
        question: &str,
    ) -> Result<bool, GradingError> {
        let grader = self.grader.as_ref().ok_or(GradingError::Disabled)?;
        grader.grade(user_answer, correct_answer, question).await
    }

    fn fallback(user_answer: &str, correct_answer: &str) -> GradeOutcome {
        GradeOutcome::new(
            fallback_grade(user_answer, correct_answer),
            GradeSource::Fallback,
        )
    }
}
