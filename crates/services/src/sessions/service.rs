use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use tracing::info;

use study_core::mastery::{MasteryGate, MasteryPolicy};
use study_core::model::{
    Catalog, CategorySelection, MasteryThresholds, Preferences, Question, SessionKey,
    SessionSnapshot, SessionState, time_score,
};
use study_core::scheduler::{QueueScheduler, QuestionQueue};
use study_core::time::elapsed_secs;

use super::progress::SessionProgress;
use super::results::SessionResults;
use crate::error::SessionError;
use crate::grading::{GradeOutcome, GradeSource};

//
// ─── PRESENTED QUESTION ────────────────────────────────────────────────────────
//

/// The question currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedQuestion {
    pub position: usize,
    pub question: Question,
    /// Multiple-choice options in display order.
    pub options: Option<Vec<String>>,
    pub presented_at: DateTime<Utc>,
}

/// An answer handed to the grader. Completing it records the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub position: usize,
    pub question: Question,
    pub answer: String,
    pub elapsed_secs: f64,
}

/// What the learner sees after an answer is graded.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub source: GradeSource,
    pub correct_answer: String,
    pub category: String,
    pub elapsed_secs: f64,
    pub target_secs: u32,
    pub within_limit: bool,
    pub time_score: f64,
    pub newly_mastered: bool,
    pub category_mastery: f64,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One study run over a catalog.
///
/// Owns the session state and the question queue. An answer is taken in two
/// steps, `begin_submission` then `complete_submission`, and no second answer
/// is accepted while one is being graded.
pub struct StudySession {
    catalog: Arc<Catalog>,
    state: SessionState,
    queue: QuestionQueue,
    scheduler: QueueScheduler,
    preferences: Preferences,
    thresholds: MasteryThresholds,
    presented: Option<PresentedQuestion>,
    in_flight: bool,
    resumed: bool,
}

impl StudySession {
    /// Start a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` for an explicit empty selection.
    pub fn start(
        catalog: Arc<Catalog>,
        selection: CategorySelection,
        preferences: Preferences,
    ) -> Result<Self, SessionError> {
        if selection.is_empty() {
            return Err(SessionError::NoSelection);
        }
        let state = SessionState::new(&catalog, selection);
        Ok(Self::assemble(catalog, state, preferences, false))
    }

    /// Continue from saved progress.
    ///
    /// The saved question order is reused when present, otherwise the queue
    /// starts from catalog order. The saved index is clamped to the queue
    /// length.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` for an explicit empty selection.
    pub fn resume(
        catalog: Arc<Catalog>,
        snapshot: SessionSnapshot,
        selection: CategorySelection,
        preferences: Preferences,
    ) -> Result<Self, SessionError> {
        if selection.is_empty() {
            return Err(SessionError::NoSelection);
        }
        let state = SessionState::restore(&catalog, snapshot, selection);
        Ok(Self::assemble(catalog, state, preferences, true))
    }

    fn assemble(
        catalog: Arc<Catalog>,
        mut state: SessionState,
        preferences: Preferences,
        resumed: bool,
    ) -> Self {
        let previous = if state.question_order().is_empty() {
            QuestionQueue::from_entries(
                catalog
                    .questions()
                    .iter()
                    .enumerate()
                    .filter(|(_, q)| state.selection().includes(q.category()))
                    .map(|(i, _)| i)
                    .collect(),
            )
        } else {
            QuestionQueue::from_entries(state.question_order().to_vec())
        };
        state.set_current_index(state.current_index().min(previous.len()));

        let mut session = Self {
            catalog,
            state,
            queue: previous,
            scheduler: QueueScheduler::new(),
            preferences,
            thresholds: MasteryThresholds::default(),
            presented: None,
            in_flight: false,
            resumed,
        };
        session.reschedule();
        session
    }

    /// Rebuild the queue from the current one and remember its order.
    fn reschedule(&mut self) {
        self.queue = self
            .scheduler
            .rebuild(&self.catalog, &mut self.state, &self.queue);
        self.state.set_question_order(self.queue.entries().to_vec());
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: MasteryThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        self.catalog.session_key()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    #[must_use]
    pub fn queue(&self) -> &QuestionQueue {
        &self.queue
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Apply new preferences; they take effect from the next answer.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    #[must_use]
    pub fn policy(&self) -> MasteryPolicy {
        MasteryPolicy::from_preferences(&self.preferences, self.thresholds)
    }

    #[must_use]
    pub fn presented(&self) -> Option<&PresentedQuestion> {
        self.presented.as_ref()
    }

    /// True while an answer is waiting for its grade.
    #[must_use]
    pub fn is_grading(&self) -> bool {
        self.in_flight
    }

    /// True when the session continued from saved progress.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.current_index() >= self.queue.len()
    }

    /// Change which categories are studied and rebuild the queue.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` for an explicit empty selection
    /// (the queue is left unchanged) and `SessionError::AnswerInFlight`
    /// while an answer is being graded.
    pub fn set_selection(&mut self, selection: CategorySelection) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::AnswerInFlight);
        }
        if selection.is_empty() {
            return Err(SessionError::NoSelection);
        }
        self.state.set_selection(selection);
        self.reschedule();
        self.presented = None;
        Ok(())
    }

    /// Show the question at the current position and start its timer.
    ///
    /// Presenting again without answering returns the same question and
    /// keeps the original start time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when the queue is exhausted and
    /// `SessionError::AnswerInFlight` while an answer is being graded.
    pub fn present(&mut self, now: DateTime<Utc>) -> Result<&PresentedQuestion, SessionError> {
        if self.in_flight {
            return Err(SessionError::AnswerInFlight);
        }
        let position = self.state.current_index();
        if self
            .presented
            .as_ref()
            .is_some_and(|p| p.position != position)
        {
            self.presented = None;
        }

        if self.presented.is_none() {
            let question = self
                .queue
                .question(&self.catalog, position)
                .ok_or(SessionError::Completed)?
                .clone();
            let options = question.options().map(|options| {
                let mut shuffled = options.to_vec();
                shuffled.shuffle(&mut rng());
                shuffled
            });
            self.presented = Some(PresentedQuestion {
                position,
                question,
                options,
                presented_at: now,
            });
        }

        self.presented.as_ref().ok_or(SessionError::NotPresented)
    }

    /// Take an answer for the presented question and mark grading in flight.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AnswerInFlight` if another answer is being
    /// graded, `SessionError::NotPresented` if no question is showing, and
    /// `SessionError::EmptyAnswer` for a multiple-choice submission without
    /// a selected option.
    pub fn begin_submission(
        &mut self,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<Submission, SessionError> {
        if self.in_flight {
            return Err(SessionError::AnswerInFlight);
        }
        let presented = self.presented.as_ref().ok_or(SessionError::NotPresented)?;
        if presented.question.is_multiple_choice() && answer.trim().is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        let submission = Submission {
            position: presented.position,
            question: presented.question.clone(),
            answer: answer.to_string(),
            elapsed_secs: elapsed_secs(presented.presented_at, now),
        };
        self.in_flight = true;
        Ok(submission)
    }

    /// Release the in-flight guard without recording anything. The question
    /// stays presented so it can be answered again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoPendingSubmission` if nothing is in flight.
    pub fn abandon_submission(&mut self) -> Result<(), SessionError> {
        if !self.in_flight {
            return Err(SessionError::NoPendingSubmission);
        }
        self.in_flight = false;
        Ok(())
    }

    /// Record a graded answer: update stats, evaluate mastery, move the
    /// answered question into the fixed prefix and rebuild the remaining
    /// queue.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoPendingSubmission` if no answer is in flight.
    pub fn complete_submission(
        &mut self,
        submission: Submission,
        outcome: GradeOutcome,
    ) -> Result<AnswerFeedback, SessionError> {
        if !self.in_flight {
            return Err(SessionError::NoPendingSubmission);
        }
        self.in_flight = false;
        self.presented = None;

        let question = &submission.question;
        let category = question.category().to_string();
        let within_limit =
            self.state
                .record_answer(question, outcome.is_correct, submission.elapsed_secs);

        let was_mastered = self.state.is_mastered(&category);
        let gate = MasteryGate::new(self.policy());
        let is_mastered = self.state.evaluate_mastery(&category, &gate, &self.catalog);
        let newly_mastered = is_mastered && !was_mastered;
        if newly_mastered {
            info!(%category, "category mastered");
        }

        self.state.set_current_index(submission.position + 1);
        self.reschedule();

        Ok(AnswerFeedback {
            is_correct: outcome.is_correct,
            source: outcome.source,
            correct_answer: question.answer().to_string(),
            elapsed_secs: submission.elapsed_secs,
            target_secs: question.target_secs(),
            within_limit,
            time_score: time_score(
                submission.elapsed_secs,
                question.target_secs(),
                self.preferences.time_scoring(),
            ),
            newly_mastered,
            category_mastery: self.state.effective_mastery(&category),
            category,
        })
    }

    /// Move to the next question to study.
    ///
    /// Under adaptive mastery, questions from mastered categories are
    /// skipped unless nothing else remains. Returns whether a question is
    /// left.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AnswerInFlight` while an answer is being graded.
    pub fn advance(&mut self) -> Result<bool, SessionError> {
        if self.in_flight {
            return Err(SessionError::AnswerInFlight);
        }
        let current = self.state.current_index();
        let next = self.scheduler.next_unmastered_index(
            &self.catalog,
            &self.queue,
            &self.state,
            current,
            self.policy().is_adaptive(),
        );
        if next != current {
            self.state.set_current_index(next);
            self.presented = None;
        }
        Ok(!self.is_complete())
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.queue.len();
        let position = self.state.current_index().min(total);
        SessionProgress {
            total,
            position,
            answered: usize::try_from(self.state.answered()).unwrap_or(usize::MAX),
            remaining: total - position,
            mastered_categories: self
                .state
                .category_names()
                .filter(|name| self.state.is_mastered(name))
                .count(),
            is_complete: self.is_complete(),
        }
    }

    /// Final summary of the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoAnswers` if nothing was answered.
    pub fn results(&self) -> Result<SessionResults, SessionError> {
        SessionResults::build(&self.catalog, &self.state, self.policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::{QuestionDraft, QuestionKind};
    use study_core::time::fixed_now;

    fn free_catalog() -> Arc<Catalog> {
        let questions = [
            ("What is 2 + 2?", "4", "arithmetic"),
            ("Area of a unit square?", "1", "geometry"),
            ("What is 3 * 3?", "9", "arithmetic"),
        ]
        .into_iter()
        .map(|(text, answer, category)| {
            QuestionDraft::new(text, answer)
                .with_category(category)
                .with_target_secs(10)
                .validate()
                .unwrap()
        })
        .collect();
        Arc::new(Catalog::new("math.csv", QuestionKind::FreeResponse, questions).unwrap())
    }

    fn answer(session: &mut StudySession, is_correct: bool, secs: i64) -> AnswerFeedback {
        let shown_at = fixed_now();
        session.present(shown_at).unwrap();
        let submission = session
            .begin_submission("x", shown_at + chrono::Duration::seconds(secs))
            .unwrap();
        let source = GradeSource::Grader;
        session
            .complete_submission(submission, GradeOutcome::new(is_correct, source))
            .unwrap()
    }

    #[test]
    fn empty_selection_is_rejected() {
        let result = StudySession::start(
            free_catalog(),
            CategorySelection::only(Vec::<String>::new()),
            Preferences::default(),
        );
        assert!(matches!(result, Err(SessionError::NoSelection)));
    }

    #[test]
    fn present_keeps_start_time_until_answered() {
        let mut session =
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap();
        let first = session.present(fixed_now()).unwrap().clone();
        let again = session
            .present(fixed_now() + chrono::Duration::seconds(5))
            .unwrap()
            .clone();
        assert_eq!(first, again);
        assert_eq!(first.question.text(), "What is 2 + 2?");
    }

    #[test]
    fn second_submission_is_refused_while_grading() {
        let mut session =
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap();
        session.present(fixed_now()).unwrap();
        let pending = session.begin_submission("4", fixed_now()).unwrap();
        assert!(session.is_grading());
        assert_eq!(
            session.begin_submission("4", fixed_now()).unwrap_err(),
            SessionError::AnswerInFlight
        );
        assert_eq!(
            session.set_selection(CategorySelection::All).unwrap_err(),
            SessionError::AnswerInFlight
        );

        session
            .complete_submission(pending, GradeOutcome::new(true, GradeSource::ExactMatch))
            .unwrap();
        assert!(!session.is_grading());
        assert_eq!(session.state().answered(), 1);
    }

    #[test]
    fn abandoned_submission_can_be_retried() {
        let mut session =
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap();
        session.present(fixed_now()).unwrap();
        session.begin_submission("4", fixed_now()).unwrap();
        session.abandon_submission().unwrap();
        assert!(session.presented().is_some());
        assert!(session.begin_submission("4", fixed_now()).is_ok());
        assert_eq!(
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap()
                .abandon_submission()
                .unwrap_err(),
            SessionError::NoPendingSubmission
        );
    }

    #[test]
    fn complete_without_submission_fails() {
        let mut session =
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap();
        let question = session.catalog().questions()[0].clone();
        let stray = Submission {
            position: 0,
            question,
            answer: "4".into(),
            elapsed_secs: 1.0,
        };
        assert_eq!(
            session
                .complete_submission(stray, GradeOutcome::new(true, GradeSource::Grader))
                .unwrap_err(),
            SessionError::NoPendingSubmission
        );
    }

    #[test]
    fn feedback_reports_timing() {
        let mut session =
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap();
        let feedback = answer(&mut session, true, 15);
        assert!(feedback.is_correct);
        assert_eq!(feedback.target_secs, 10);
        assert!(!feedback.within_limit);
        assert!((feedback.elapsed_secs - 15.0).abs() < 1e-9);
        assert!((feedback.time_score - 50.0).abs() < 1e-9);
        assert_eq!(feedback.correct_answer, "4");
        assert_eq!(session.state().current_index(), 1);
    }

    #[test]
    fn answered_question_moves_into_fixed_prefix() {
        let mut session =
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap();
        // Perfect arithmetic answer ranks geometry (untouched, 0) first.
        answer(&mut session, true, 1);
        let order: Vec<&str> = session
            .queue()
            .questions(session.catalog())
            .map(Question::text)
            .collect();
        assert_eq!(
            order,
            vec!["What is 2 + 2?", "Area of a unit square?", "What is 3 * 3?"]
        );
        assert_eq!(session.progress().answered, 1);
        assert_eq!(session.progress().remaining, 2);
    }

    #[test]
    fn adaptive_mastery_skips_mastered_category() {
        let prefs = Preferences::default().with_required_streak(5);
        let questions = (0..7)
            .map(|i| {
                let category = if i < 6 { "arithmetic" } else { "geometry" };
                QuestionDraft::new(format!("q{i}"), "a")
                    .with_category(category)
                    .with_target_secs(10)
                    .validate()
                    .unwrap()
            })
            .collect();
        let catalog =
            Arc::new(Catalog::new("set", QuestionKind::FreeResponse, questions).unwrap());
        let mut session = StudySession::start(catalog, CategorySelection::All, prefs).unwrap();

        let mut newly = false;
        while !session.is_complete() && !session.state().is_mastered("arithmetic") {
            let category = session
                .present(fixed_now())
                .unwrap()
                .question
                .category()
                .to_string();
            let submission = session.begin_submission("a", fixed_now()).unwrap();
            let feedback = session
                .complete_submission(
                    submission,
                    GradeOutcome::new(category == "arithmetic", GradeSource::Grader),
                )
                .unwrap();
            newly |= feedback.newly_mastered;
            session.advance().unwrap();
        }

        assert!(newly);
        assert!(session.state().is_mastered("arithmetic"));
        assert_eq!(session.state().stats("arithmetic").unwrap().correct, 5);
        assert_eq!(session.progress().mastered_categories, 1);

        // Only mastered questions remain, so the session continues in order.
        assert!(!session.is_complete());
        assert_eq!(session.present(fixed_now()).unwrap().question.text(), "q5");
    }

    #[test]
    fn results_need_answers_and_summarize_categories() {
        let mut session =
            StudySession::start(free_catalog(), CategorySelection::All, Preferences::default())
                .unwrap();
        assert_eq!(session.results().unwrap_err(), SessionError::NoAnswers);

        answer(&mut session, true, 4);
        session.advance().unwrap();
        answer(&mut session, false, 6);

        let results = session.results().unwrap();
        assert_eq!(results.answered, 2);
        assert!((results.accuracy - 50.0).abs() < 1e-9);
        assert!((results.average_time_secs - 5.0).abs() < 1e-9);
        let names: Vec<&str> = results.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["arithmetic", "geometry"]);
        assert_eq!(results.categories[0].required_streak, Some(10));
        assert_eq!(results.categories[1].streak, 0);
    }

    #[test]
    fn resume_clamps_index_and_keeps_prefix() {
        let catalog = free_catalog();
        let mut snapshot = SessionSnapshot {
            current_index: 99,
            correct_answers: 3,
            ..SessionSnapshot::default()
        };
        snapshot.saved_at = Some(fixed_now());
        let session = StudySession::resume(
            Arc::clone(&catalog),
            snapshot,
            CategorySelection::All,
            Preferences::default(),
        )
        .unwrap();
        assert!(session.is_resumed());
        assert_eq!(session.state().current_index(), 3);
        assert!(session.is_complete());
    }

    #[test]
    fn resume_follows_the_saved_question_order() {
        let questions = [("a1", "arithmetic"), ("a2", "arithmetic"), ("g1", "geometry")]
            .into_iter()
            .map(|(text, category)| {
                QuestionDraft::new(text, "x")
                    .with_category(category)
                    .with_target_secs(10)
                    .validate()
                    .unwrap()
            })
            .collect();
        let catalog =
            Arc::new(Catalog::new("mixed", QuestionKind::FreeResponse, questions).unwrap());
        let mut session =
            StudySession::start(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
                .unwrap();

        // A strong arithmetic answer pulls geometry ahead of a2.
        answer(&mut session, true, 1);
        assert_eq!(session.present(fixed_now()).unwrap().question.text(), "g1");
        answer(&mut session, true, 1);
        assert_eq!(session.state().question_order(), session.queue().entries());

        let resumed = StudySession::resume(
            catalog,
            session.state().snapshot(),
            CategorySelection::All,
            Preferences::default(),
        )
        .unwrap();
        let order: Vec<&str> = resumed
            .queue()
            .questions(resumed.catalog())
            .map(Question::text)
            .collect();
        assert_eq!(order, vec!["a1", "g1", "a2"]);
        assert_eq!(resumed.state().current_index(), 2);
    }

    #[test]
    fn multiple_choice_needs_a_selected_option() {
        let questions = vec![
            QuestionDraft::new("2 + 2?", "4")
                .with_options(["3", "5"])
                .validate()
                .unwrap(),
        ];
        let catalog =
            Arc::new(Catalog::new("mcq", QuestionKind::MultipleChoice, questions).unwrap());
        let mut session =
            StudySession::start(catalog, CategorySelection::All, Preferences::default()).unwrap();
        let shown = session.present(fixed_now()).unwrap();
        let mut options = shown.options.clone().unwrap();
        options.sort();
        assert_eq!(options, vec!["3", "4", "5"]);

        assert_eq!(
            session.begin_submission(" ", fixed_now()).unwrap_err(),
            SessionError::EmptyAnswer
        );
        assert!(!session.is_grading());
    }
}
