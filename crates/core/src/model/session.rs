use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::mastery::MasteryGate;
use crate::model::catalog::Catalog;
use crate::model::performance::CategoryPerformance;
use crate::model::question::{DEFAULT_TARGET_SECS, Question};
use crate::model::stats::CategoryStats;

//
// ─── CATEGORY SELECTION ────────────────────────────────────────────────────────
//

/// Which categories the learner chose to study.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategorySelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl CategorySelection {
    #[must_use]
    pub fn only<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(categories.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn includes(&self, category: &str) -> bool {
        match self {
            CategorySelection::All => true,
            CategorySelection::Only(set) => set.contains(category),
        }
    }

    /// True for an explicit selection with nothing in it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, CategorySelection::Only(set) if set.is_empty())
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// The persisted projection of a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub current_index: usize,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub total_time_secs: f64,
    pub response_times: Vec<f64>,
    pub categories: BTreeMap<String, CategoryStats>,
    pub performance: BTreeMap<String, CategoryPerformance>,
    /// Catalog indices of the live queue, answered prefix first.
    pub question_order: Vec<usize>,
    pub saved_at: Option<DateTime<Utc>>,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// All mutable data of one study session over a catalog.
///
/// The stats and performance maps always hold exactly the catalog's
/// categories.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    current_index: usize,
    correct_answers: u32,
    incorrect_answers: u32,
    total_time_secs: f64,
    response_times: Vec<f64>,
    categories: BTreeMap<String, CategoryStats>,
    performance: BTreeMap<String, CategoryPerformance>,
    selection: CategorySelection,
    question_order: Vec<usize>,
    last_saved_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Fresh state with empty stats for every catalog category.
    #[must_use]
    pub fn new(catalog: &Catalog, selection: CategorySelection) -> Self {
        let categories = catalog
            .categories()
            .iter()
            .map(|c| (c.clone(), CategoryStats::default()))
            .collect();
        let performance = catalog
            .categories()
            .iter()
            .map(|c| (c.clone(), CategoryPerformance::default()))
            .collect();

        Self {
            current_index: 0,
            correct_answers: 0,
            incorrect_answers: 0,
            total_time_secs: 0.0,
            response_times: Vec::new(),
            categories,
            performance,
            selection,
            question_order: Vec::new(),
            last_saved_at: None,
        }
    }

    /// Rebuild state from a snapshot.
    ///
    /// Saved categories the catalog does not know are dropped; catalog
    /// categories missing from the snapshot start fresh.
    #[must_use]
    pub fn restore(
        catalog: &Catalog,
        mut snapshot: SessionSnapshot,
        selection: CategorySelection,
    ) -> Self {
        let mut state = Self::new(catalog, selection);
        for (name, stats) in &mut state.categories {
            if let Some(saved) = snapshot.categories.remove(name) {
                *stats = saved;
            }
        }
        for (name, perf) in &mut state.performance {
            if let Some(saved) = snapshot.performance.remove(name) {
                *perf = saved;
            }
        }

        state.current_index = snapshot.current_index;
        state.correct_answers = snapshot.correct_answers;
        state.incorrect_answers = snapshot.incorrect_answers;
        state.total_time_secs = sanitize_secs(snapshot.total_time_secs);
        state.response_times = snapshot.response_times;
        let total = catalog.questions().len();
        if snapshot.question_order.iter().all(|index| *index < total) {
            state.question_order = snapshot.question_order;
        }
        state.last_saved_at = snapshot.saved_at;
        state
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_index: self.current_index,
            correct_answers: self.correct_answers,
            incorrect_answers: self.incorrect_answers,
            total_time_secs: self.total_time_secs,
            response_times: self.response_times.clone(),
            categories: self.categories.clone(),
            performance: self.performance.clone(),
            question_order: self.question_order.clone(),
            saved_at: self.last_saved_at,
        }
    }

    /// Apply one graded answer to totals, category stats and the rolling tracker.
    ///
    /// Returns whether the answer was within the question's target time.
    pub fn record_answer(&mut self, question: &Question, is_correct: bool, elapsed_secs: f64) -> bool {
        let elapsed_secs = sanitize_secs(elapsed_secs);
        let within_limit = elapsed_secs <= f64::from(question.target_secs());

        if is_correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        } else {
            self.incorrect_answers = self.incorrect_answers.saturating_add(1);
        }
        self.total_time_secs += elapsed_secs;
        self.response_times.push(elapsed_secs);

        let category = question.category().to_string();
        self.performance
            .entry(category.clone())
            .or_default()
            .record_attempt(is_correct, within_limit);
        self.categories
            .entry(category)
            .or_default()
            .record(is_correct, elapsed_secs);

        within_limit
    }

    /// Run the mastery gate for one category. Unknown categories are never mastered.
    pub fn evaluate_mastery(&mut self, category: &str, gate: &MasteryGate, catalog: &Catalog) -> bool {
        let average_target = catalog
            .average_target_secs(category)
            .unwrap_or(f64::from(DEFAULT_TARGET_SECS));
        let (Some(stats), Some(perf)) = (
            self.categories.get_mut(category),
            self.performance.get_mut(category),
        ) else {
            return false;
        };
        gate.evaluate(stats, perf, average_target)
    }

    /// Score used for ordering: the rolling score once the category has
    /// attempts, the aggregate mastery value otherwise.
    #[must_use]
    pub fn effective_mastery(&self, category: &str) -> f64 {
        match self.performance.get(category) {
            Some(perf) if perf.total_attempts() > 0 => perf.mastery_score(),
            _ => self.categories.get(category).map_or(0.0, |s| s.mastery),
        }
    }

    /// Mean rolling score over categories that have been attempted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overall_mastery(&self) -> Option<f64> {
        let attempted: Vec<f64> = self
            .performance
            .values()
            .filter(|p| p.total_attempts() > 0)
            .map(CategoryPerformance::mastery_score)
            .collect();
        (!attempted.is_empty()).then(|| attempted.iter().sum::<f64>() / attempted.len() as f64)
    }

    #[must_use]
    pub fn is_mastered(&self, category: &str) -> bool {
        self.categories.get(category).is_some_and(|s| s.is_mastered)
    }

    /// A session has started once any question was answered.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.answered() > 0
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.correct_answers.saturating_add(self.incorrect_answers)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn set_current_index(&mut self, index: usize) {
        self.current_index = index;
    }

    /// Catalog indices of the queue as last scheduled. Empty until a queue
    /// has been recorded.
    #[must_use]
    pub fn question_order(&self) -> &[usize] {
        &self.question_order
    }

    pub fn set_question_order(&mut self, order: Vec<usize>) {
        self.question_order = order;
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn incorrect_answers(&self) -> u32 {
        self.incorrect_answers
    }

    #[must_use]
    pub fn total_time_secs(&self) -> f64 {
        self.total_time_secs
    }

    #[must_use]
    pub fn response_times(&self) -> &[f64] {
        &self.response_times
    }

    #[must_use]
    pub fn selection(&self) -> &CategorySelection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: CategorySelection) {
        self.selection = selection;
    }

    #[must_use]
    pub fn stats(&self, category: &str) -> Option<&CategoryStats> {
        self.categories.get(category)
    }

    #[must_use]
    pub fn performance(&self, category: &str) -> Option<&CategoryPerformance> {
        self.performance.get(category)
    }

    /// Category names tracked by this session, sorted.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    #[must_use]
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.last_saved_at = Some(at);
    }
}

fn sanitize_secs(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 { secs } else { 0.0 }
}
