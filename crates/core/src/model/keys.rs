use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix for progress saved without a signed-in user.
pub const ANONYMOUS_PROGRESS_PREFIX: &str = "quickstudy_progress_";

/// Prefix for progress namespaced by user.
pub const USER_PROGRESS_PREFIX: &str = "progress_";

/// Storage key of the preferences blob.
pub const PREFERENCES_KEY: &str = "quickstudy_preferences";

/// Stable key for a loaded question set, used to find its saved progress.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    /// Derive the key from a question-set identifier.
    ///
    /// Strips any directory prefix and the final extension, lowercases, and
    /// replaces every character outside `[a-z0-9]` with `_`.
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        let name = source.rsplit('/').next().unwrap_or(source);
        let stem = match name.rfind('.') {
            Some(dot) => &name[..dot],
            None => name,
        };
        let key = stem
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identifier of the signed-in user, supplied by the identity provider.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Returns `None` for blank identifiers.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as written into storage keys: `%` becomes `%25` and `_`
    /// becomes `%5F`, so the first `_` after the prefix ends the user part.
    #[must_use]
    pub fn key_segment(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for c in self.0.chars() {
            match c {
                '%' => out.push_str("%25"),
                '_' => out.push_str("%5F"),
                c => out.push(c),
            }
        }
        out
    }
}

/// Full storage key for a session's progress blob.
///
/// Signed-in users get `progress_{user}_{session}` with the user id escaped
/// by [`UserId::key_segment`]; anonymous progress uses
/// `quickstudy_progress_{session}`.
#[must_use]
pub fn progress_key(user: Option<&UserId>, session: &SessionKey) -> String {
    match user {
        Some(user) => format!("{USER_PROGRESS_PREFIX}{}_{}", user.key_segment(), session.0),
        None => format!("{ANONYMOUS_PROGRESS_PREFIX}{}", session.0),
    }
}

/// Returns true if a storage key holds session progress of any user.
#[must_use]
pub fn is_progress_key(key: &str) -> bool {
    key.starts_with(ANONYMOUS_PROGRESS_PREFIX) || key.starts_with(USER_PROGRESS_PREFIX)
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
