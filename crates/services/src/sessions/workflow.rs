use std::sync::Arc;

use tracing::{debug, info, warn};

use study_core::model::{Catalog, CategorySelection, MasteryThresholds, Preferences};

use super::service::{AnswerFeedback, PresentedQuestion, StudySession};
use crate::Clock;
use crate::error::SessionError;
use crate::grading::GradingService;
use crate::progress_store::ProgressStore;

/// Orchestrates session start, grading and persistence around each answer.
///
/// Progress is saved after every graded answer and again after advancing,
/// before the next question is shown.
#[derive(Clone)]
pub struct StudyLoopService {
    clock: Clock,
    progress: ProgressStore,
    grading: GradingService,
    thresholds: MasteryThresholds,
}

impl StudyLoopService {
    #[must_use]
    pub fn new(clock: Clock, progress: ProgressStore, grading: GradingService) -> Self {
        Self {
            clock,
            progress,
            grading,
            thresholds: MasteryThresholds::default(),
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: MasteryThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn progress_store(&self) -> &ProgressStore {
        &self.progress
    }

    #[must_use]
    pub fn grading(&self) -> &GradingService {
        &self.grading
    }

    /// Whether the catalog has saved progress to continue.
    pub async fn has_saved(&self, catalog: &Catalog) -> bool {
        self.progress.has_saved(&catalog.session_key()).await
    }

    /// Start over, discarding any saved progress for this catalog.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` for an explicit empty selection.
    pub async fn start_new(
        &self,
        catalog: Arc<Catalog>,
        selection: CategorySelection,
        preferences: Preferences,
    ) -> Result<StudySession, SessionError> {
        let session = StudySession::start(Arc::clone(&catalog), selection, preferences)?
            .with_thresholds(self.thresholds);
        self.progress.clear(&catalog.session_key()).await;
        info!(source = catalog.source_id(), "started new session");
        Ok(session)
    }

    /// Continue saved progress when it exists and is fresh, otherwise start
    /// a new session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` for an explicit empty selection.
    pub async fn continue_or_start(
        &self,
        catalog: Arc<Catalog>,
        selection: CategorySelection,
        preferences: Preferences,
    ) -> Result<StudySession, SessionError> {
        let Some(snapshot) = self.progress.load(&catalog.session_key()).await else {
            return self.start_new(catalog, selection, preferences).await;
        };

        let mut session = StudySession::resume(Arc::clone(&catalog), snapshot, selection, preferences)?
            .with_thresholds(self.thresholds);
        session.advance()?;
        info!(
            source = catalog.source_id(),
            index = session.state().current_index(),
            "resumed session"
        );
        Ok(session)
    }

    /// Show the current question and start its timer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when no question is left.
    pub fn present(&self, session: &mut StudySession) -> Result<PresentedQuestion, SessionError> {
        session.present(self.clock.now()).cloned()
    }

    /// Grade and record an answer to the presented question, then save.
    ///
    /// Dropping the returned future while grading releases the in-flight
    /// guard and leaves the question presented for another attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if no question is presented, an answer is
    /// already in flight, or a multiple-choice answer is blank.
    pub async fn answer_current(
        &self,
        session: &mut StudySession,
        answer: &str,
    ) -> Result<AnswerFeedback, SessionError> {
        let submission = session.begin_submission(answer, self.clock.now())?;
        let mut pending = PendingAnswer(session);
        let outcome = self
            .grading
            .grade(&submission.question, &submission.answer)
            .await;
        let session = &mut *pending.0;
        let feedback = session.complete_submission(submission, outcome)?;
        debug!(
            category = %feedback.category,
            correct = feedback.is_correct,
            source = ?feedback.source,
            "answer recorded"
        );

        let key = session.session_key();
        self.progress.save(session.state_mut(), &key).await;
        Ok(feedback)
    }

    /// Advance, save, and present the next question. Returns `None` when
    /// the session is complete.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AnswerInFlight` while an answer is being graded.
    pub async fn next(
        &self,
        session: &mut StudySession,
    ) -> Result<Option<PresentedQuestion>, SessionError> {
        let has_next = session.advance()?;
        let key = session.session_key();
        self.progress.save(session.state_mut(), &key).await;
        if !has_next {
            info!(source = session.catalog().source_id(), "session complete");
            return Ok(None);
        }
        self.present(session).map(Some)
    }

    /// Change the studied categories and save when the session has begun.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` for an explicit empty selection
    /// and `SessionError::AnswerInFlight` while an answer is being graded.
    pub async fn change_selection(
        &self,
        session: &mut StudySession,
        selection: CategorySelection,
    ) -> Result<(), SessionError> {
        session.set_selection(selection)?;
        if session.state().is_started() {
            let key = session.session_key();
            self.progress.save(session.state_mut(), &key).await;
        }
        Ok(())
    }
}

/// Holds a session while its answer is graded. Dropped with the grade still
/// pending, it abandons the submission.
struct PendingAnswer<'a>(&'a mut StudySession);

impl Drop for PendingAnswer<'_> {
    fn drop(&mut self) {
        if self.0.is_grading() && self.0.abandon_submission().is_ok() {
            warn!("grading cancelled, answer discarded");
        }
    }
}
