use crate::model::{Catalog, Question, SessionState};

//
// ─── QUEUE ─────────────────────────────────────────────────────────────────────
//

/// Ordered list of questions to present, stored as catalog positions.
///
/// Positions before the session's current index are the answered prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestionQueue {
    entries: Vec<usize>,
}

impl QuestionQueue {
    #[must_use]
    pub fn from_entries(entries: Vec<usize>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Catalog index of the question at a queue position.
    #[must_use]
    pub fn catalog_index(&self, position: usize) -> Option<usize> {
        self.entries.get(position).copied()
    }

    #[must_use]
    pub fn question<'a>(&self, catalog: &'a Catalog, position: usize) -> Option<&'a Question> {
        self.catalog_index(position).and_then(|i| catalog.get(i))
    }

    pub fn questions<'a>(&'a self, catalog: &'a Catalog) -> impl Iterator<Item = &'a Question> + 'a {
        self.entries.iter().filter_map(|i| catalog.get(*i))
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Builds the question queue from the catalog, the session's category
/// selection and per-category mastery.
///
/// Before the first answer the queue is the selected questions in catalog
/// order. Once answering has begun, the answered prefix stays fixed and the
/// remaining questions are ordered weakest category first, harder questions
/// first within a tie.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueScheduler;

impl QueueScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Rebuild the queue for the session's current selection.
    ///
    /// Resets the current index to 0 when the session has not started;
    /// otherwise the index is preserved. An explicit empty selection yields an
    /// empty queue.
    #[must_use]
    pub fn rebuild(
        &self,
        catalog: &Catalog,
        state: &mut SessionState,
        previous: &QuestionQueue,
    ) -> QuestionQueue {
        let selection = state.selection().clone();

        if !state.is_started() {
            state.set_current_index(0);
            let entries = catalog
                .questions()
                .iter()
                .enumerate()
                .filter(|(_, q)| selection.includes(q.category()))
                .map(|(i, _)| i)
                .collect();
            return QuestionQueue::from_entries(entries);
        }

        let answered_len = state.current_index().min(previous.len());
        let answered = &previous.entries()[..answered_len];

        let mut remaining: Vec<usize> = catalog
            .questions()
            .iter()
            .enumerate()
            .filter(|(_, q)| selection.includes(q.category()))
            .filter(|(_, q)| {
                !answered
                    .iter()
                    .filter_map(|i| catalog.get(*i))
                    .any(|done| done.same_prompt(q))
            })
            .map(|(i, _)| i)
            .collect();

        // Stable sort keeps catalog order among full ties.
        remaining.sort_by(|a, b| {
            let (qa, qb) = (&catalog.questions()[*a], &catalog.questions()[*b]);
            let score_a = state.effective_mastery(qa.category());
            let score_b = state.effective_mastery(qb.category());
            score_a
                .total_cmp(&score_b)
                .then_with(|| qb.difficulty().rank().cmp(&qa.difficulty().rank()))
        });

        let mut entries = answered.to_vec();
        entries.extend(remaining);
        QuestionQueue::from_entries(entries)
    }

    /// Index of the next question whose category is not yet mastered.
    ///
    /// Only skips under the adaptive policy. When every remaining question
    /// belongs to a mastered category, `current` is returned unchanged so the
    /// session keeps moving sequentially.
    #[must_use]
    pub fn next_unmastered_index(
        &self,
        catalog: &Catalog,
        queue: &QuestionQueue,
        state: &SessionState,
        current: usize,
        adaptive: bool,
    ) -> usize {
        if !adaptive {
            return current;
        }
        (current..queue.len())
            .find(|position| {
                queue
                    .question(catalog, *position)
                    .is_some_and(|q| !state.is_mastered(q.category()))
            })
            .unwrap_or(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::{MasteryGate, MasteryPolicy};
    use crate::model::{CategorySelection, Difficulty, QuestionDraft, QuestionKind};

    fn q(text: &str, category: &str, difficulty: Difficulty) -> Question {
        QuestionDraft::new(text, format!("{text}-answer"))
            .with_category(category)
            .with_difficulty(difficulty)
            .with_target_secs(30)
            .validate()
            .unwrap()
    }

    fn catalog(questions: Vec<Question>) -> Catalog {
        Catalog::new("set", QuestionKind::FreeResponse, questions).unwrap()
    }

    fn texts(queue: &QuestionQueue, catalog: &Catalog) -> Vec<String> {
        queue
            .questions(catalog)
            .map(|q| q.text().to_string())
            .collect()
    }

    #[test]
    fn not_started_all_keeps_catalog_order() {
        let catalog = catalog(vec![
            q("g1", "geometry", Difficulty::Easy),
            q("a1", "algebra", Difficulty::Hard),
            q("g2", "geometry", Difficulty::Medium),
        ]);
        let mut state = SessionState::new(&catalog, CategorySelection::All);
        state.set_current_index(2);

        let queue = QueueScheduler::new().rebuild(&catalog, &mut state, &QuestionQueue::default());
        assert_eq!(texts(&queue, &catalog), vec!["g1", "a1", "g2"]);
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn not_started_filters_to_selection() {
        let catalog = catalog(vec![
            q("g1", "geometry", Difficulty::Easy),
            q("a1", "algebra", Difficulty::Hard),
        ]);
        let mut state = SessionState::new(&catalog, CategorySelection::only(["algebra"]));
        let queue = QueueScheduler::new().rebuild(&catalog, &mut state, &QuestionQueue::default());
        assert_eq!(texts(&queue, &catalog), vec!["a1"]);
    }

    #[test]
    fn empty_selection_yields_empty_queue() {
        let catalog = catalog(vec![q("g1", "geometry", Difficulty::Easy)]);
        let mut state =
            SessionState::new(&catalog, CategorySelection::only(Vec::<String>::new()));
        let queue = QueueScheduler::new().rebuild(&catalog, &mut state, &QuestionQueue::default());
        assert!(queue.is_empty());
    }

    #[test]
    fn in_progress_orders_weak_categories_then_harder_questions() {
        let catalog = catalog(vec![
            q("warmup", "warmup", Difficulty::Medium),
            q("g1", "geometry", Difficulty::Hard),
            q("a-easy", "algebra", Difficulty::Easy),
            q("a-hard", "algebra", Difficulty::Hard),
        ]);
        let scheduler = QueueScheduler::new();
        let mut state = SessionState::new(&catalog, CategorySelection::All);
        let queue = scheduler.rebuild(&catalog, &mut state, &QuestionQueue::default());

        // Answer the warm-up so the session counts as started.
        state.record_answer(&catalog.questions()[0], true, 5.0);
        state.set_current_index(1);

        // No attempts yet in algebra/geometry, so aggregate mastery decides.
        let mut snapshot = state.snapshot();
        snapshot.categories.get_mut("geometry").unwrap().mastery = 40.0;
        snapshot.categories.get_mut("algebra").unwrap().mastery = 20.0;
        let mut state = SessionState::restore(&catalog, snapshot, CategorySelection::All);

        let rebuilt = scheduler.rebuild(&catalog, &mut state, &queue);
        assert_eq!(
            texts(&rebuilt, &catalog),
            vec!["warmup", "a-hard", "a-easy", "g1"]
        );
        assert_eq!(state.current_index(), 1);
    }

    #[test]
    fn answered_prefix_stays_fixed_and_is_not_repeated() {
        let catalog = catalog(vec![
            q("a1", "algebra", Difficulty::Easy),
            q("g1", "geometry", Difficulty::Easy),
            q("a2", "algebra", Difficulty::Easy),
        ]);
        let scheduler = QueueScheduler::new();
        let mut state = SessionState::new(&catalog, CategorySelection::All);
        let queue = scheduler.rebuild(&catalog, &mut state, &QuestionQueue::default());

        // Perfect algebra answer pushes algebra behind geometry.
        state.record_answer(&catalog.questions()[0], true, 1.0);
        state.set_current_index(1);

        let rebuilt = scheduler.rebuild(&catalog, &mut state, &queue);
        assert_eq!(texts(&rebuilt, &catalog), vec!["a1", "g1", "a2"]);
        assert_eq!(rebuilt.len(), catalog.len());
    }

    #[test]
    fn changing_selection_mid_session_keeps_prefix() {
        let catalog = catalog(vec![
            q("a1", "algebra", Difficulty::Easy),
            q("g1", "geometry", Difficulty::Easy),
            q("a2", "algebra", Difficulty::Easy),
        ]);
        let scheduler = QueueScheduler::new();
        let mut state = SessionState::new(&catalog, CategorySelection::All);
        let queue = scheduler.rebuild(&catalog, &mut state, &QuestionQueue::default());
        state.record_answer(&catalog.questions()[0], true, 1.0);
        state.set_current_index(1);

        state.set_selection(CategorySelection::only(["geometry"]));
        let rebuilt = scheduler.rebuild(&catalog, &mut state, &queue);
        assert_eq!(texts(&rebuilt, &catalog), vec!["a1", "g1"]);
    }

    #[test]
    fn next_unmastered_skips_mastered_categories() {
        let catalog = catalog(vec![
            q("a1", "algebra", Difficulty::Easy),
            q("a2", "algebra", Difficulty::Easy),
            q("g1", "geometry", Difficulty::Easy),
        ]);
        let scheduler = QueueScheduler::new();
        let mut state = SessionState::new(&catalog, CategorySelection::All);
        let queue = scheduler.rebuild(&catalog, &mut state, &QuestionQueue::default());

        let gate = MasteryGate::new(MasteryPolicy::Adaptive { required_streak: 1 });
        state.record_answer(&catalog.questions()[0], true, 1.0);
        assert!(state.evaluate_mastery("algebra", &gate, &catalog));

        assert_eq!(scheduler.next_unmastered_index(&catalog, &queue, &state, 1, true), 2);
        assert_eq!(scheduler.next_unmastered_index(&catalog, &queue, &state, 1, false), 1);
    }

    #[test]
    fn next_unmastered_falls_back_to_current() {
        let catalog = catalog(vec![
            q("a1", "algebra", Difficulty::Easy),
            q("a2", "algebra", Difficulty::Easy),
        ]);
        let scheduler = QueueScheduler::new();
        let mut state = SessionState::new(&catalog, CategorySelection::All);
        let queue = scheduler.rebuild(&catalog, &mut state, &QuestionQueue::default());

        let gate = MasteryGate::new(MasteryPolicy::Adaptive { required_streak: 1 });
        state.record_answer(&catalog.questions()[0], true, 1.0);
        state.evaluate_mastery("algebra", &gate, &catalog);

        assert_eq!(scheduler.next_unmastered_index(&catalog, &queue, &state, 1, true), 1);
    }
}
