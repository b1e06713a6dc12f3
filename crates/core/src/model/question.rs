use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target time used when a question row does not carry one.
pub const DEFAULT_TARGET_SECS: u32 = 30;

/// Category assigned to questions without an explicit one.
pub const DEFAULT_CATEGORY: &str = "general";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("correct answer cannot be empty")]
    EmptyAnswer,

    #[error("target time must be > 0 seconds")]
    InvalidTargetTime,

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// How hard a question is; harder questions surface first among equally weak categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Ordering rank used by the queue scheduler (`hard=3 > medium=2 > easy=1`).
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Parses a raw column value, falling back to `Medium` for anything unrecognised.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuestionError::UnknownDifficulty(other.to_string())),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question input, as handed over by a question source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionDraft {
    pub text: String,
    pub answer: String,
    pub options: Option<Vec<String>>,
    pub category: Option<String>,
    pub target_secs: Option<u32>,
    pub difficulty: Option<Difficulty>,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(text: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            answer: answer.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_target_secs(mut self, secs: u32) -> Self {
        self.target_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Validate and normalize the draft into an immutable question.
    ///
    /// Multiple-choice options are trimmed, empty entries dropped, and the
    /// correct answer appended when the option list does not contain it.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if text or answer are blank, or the target time is zero.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }
        let answer = self.answer.trim().to_string();
        if answer.is_empty() {
            return Err(QuestionError::EmptyAnswer);
        }

        let target_secs = self.target_secs.unwrap_or(DEFAULT_TARGET_SECS);
        if target_secs == 0 {
            return Err(QuestionError::InvalidTargetTime);
        }

        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let options = self.options.map(|raw| {
            let mut options: Vec<String> = raw
                .into_iter()
                .map(|opt| opt.trim().to_string())
                .filter(|opt| !opt.is_empty())
                .collect();
            if !options.iter().any(|opt| opt == &answer) {
                options.push(answer.clone());
            }
            options
        });

        Ok(Question {
            text,
            answer,
            options,
            category,
            target_secs,
            difficulty: self.difficulty.unwrap_or_default(),
        })
    }
}

/// A single study question. Immutable once validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    text: String,
    answer: String,
    options: Option<Vec<String>>,
    category: String,
    target_secs: u32,
    difficulty: Difficulty,
}

impl Question {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Answer options for multiple-choice questions; `None` for free response.
    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }

    #[must_use]
    pub fn is_multiple_choice(&self) -> bool {
        self.options.is_some()
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn target_secs(&self) -> u32 {
        self.target_secs
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Two questions are the same prompt when text and answer match.
    #[must_use]
    pub fn same_prompt(&self, other: &Question) -> bool {
        self.text == other.text && self.answer == other.answer
    }
}
