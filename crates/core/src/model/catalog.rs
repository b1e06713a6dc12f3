use thiserror::Error;

use crate::model::keys::SessionKey;
use crate::model::question::{Difficulty, Question, QuestionDraft, QuestionError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("question set contains no usable questions")]
    Empty,

    #[error("question {index} is free response in a multiple-choice set")]
    MissingOptions { index: usize },
}

//
// ─── SOURCE ROWS ───────────────────────────────────────────────────────────────
//

/// Whether a question set is answered by typing or by picking an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    FreeResponse,
    MultipleChoice,
}

/// One raw row from a question source, columns still as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuestionRow {
    pub text: String,
    pub answer: String,
    /// Semicolon-delimited option list (multiple-choice sets only).
    pub options: Option<String>,
    pub category: Option<String>,
    pub target_secs: Option<String>,
    pub difficulty: Option<String>,
}

impl RawQuestionRow {
    /// Map the raw columns onto a draft for the given set kind.
    #[must_use]
    pub fn into_draft(self, kind: QuestionKind) -> QuestionDraft {
        let options = match kind {
            QuestionKind::MultipleChoice => Some(
                self.options
                    .as_deref()
                    .unwrap_or_default()
                    .split(';')
                    .map(str::to_string)
                    .collect(),
            ),
            QuestionKind::FreeResponse => None,
        };

        QuestionDraft {
            text: self.text,
            answer: self.answer,
            options,
            category: self.category,
            target_secs: self.target_secs.as_deref().and_then(parse_target_secs),
            difficulty: self.difficulty.as_deref().map(Difficulty::parse_lenient),
        }
    }
}

/// Leading-digit parse; zero and non-numeric values mean "use the default".
fn parse_target_secs(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<u32>().ok().filter(|secs| *secs > 0)
}

/// A source row that could not become a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub index: usize,
    pub error: QuestionError,
}

/// Result of building a catalog from raw rows.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub skipped: Vec<SkippedRow>,
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// An ordered, immutable question set with the categories it contains.
///
/// Categories are listed in order of first appearance. Sessions reference
/// questions by their position in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    source_id: String,
    kind: QuestionKind,
    questions: Vec<Question>,
    categories: Vec<String>,
}

impl Catalog {
    /// Build a catalog from already validated questions.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Empty` for an empty list, or
    /// `CatalogError::MissingOptions` when a multiple-choice set contains a
    /// question without options.
    pub fn new(
        source_id: impl Into<String>,
        kind: QuestionKind,
        questions: Vec<Question>,
    ) -> Result<Self, CatalogError> {
        if questions.is_empty() {
            return Err(CatalogError::Empty);
        }
        if kind == QuestionKind::MultipleChoice {
            if let Some(index) = questions.iter().position(|q| !q.is_multiple_choice()) {
                return Err(CatalogError::MissingOptions { index });
            }
        }

        let mut categories: Vec<String> = Vec::new();
        for question in &questions {
            if !categories.iter().any(|c| c == question.category()) {
                categories.push(question.category().to_string());
            }
        }

        Ok(Self {
            source_id: source_id.into(),
            kind,
            questions,
            categories,
        })
    }

    /// Build a catalog from raw source rows, skipping rows that fail validation.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Empty` if no row produced a valid question.
    pub fn from_rows(
        source_id: impl Into<String>,
        kind: QuestionKind,
        rows: impl IntoIterator<Item = RawQuestionRow>,
    ) -> Result<LoadedCatalog, CatalogError> {
        let mut questions = Vec::new();
        let mut skipped = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            match row.into_draft(kind).validate() {
                Ok(question) => questions.push(question),
                Err(error) => skipped.push(SkippedRow { index, error }),
            }
        }

        let catalog = Self::new(source_id, kind, questions)?;
        Ok(LoadedCatalog { catalog, skipped })
    }

    /// Identifier of the question set (file name or preset path).
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Persistence key derived from the source identifier.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        SessionKey::from_source(&self.source_id)
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn questions_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Question> {
        self.questions.iter().filter(move |q| q.category() == category)
    }

    /// Mean target time over the category's questions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_target_secs(&self, category: &str) -> Option<f64> {
        let (count, total) = self
            .questions_in(category)
            .fold((0_usize, 0_f64), |(n, sum), q| {
                (n + 1, sum + f64::from(q.target_secs()))
            });
        (count > 0).then(|| total / count as f64)
    }
}
