use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use storage::records::ProgressRecord;
use storage::repository::BlobStore;
use study_core::Clock;
use study_core::model::{SessionKey, SessionSnapshot, SessionState, UserId, is_progress_key, progress_key};

/// Saved progress older than this is discarded when loaded.
pub const LOAD_MAX_AGE_DAYS: i64 = 7;

/// Saved progress older than this is removed by the startup sweep.
pub const SWEEP_MAX_AGE_DAYS: i64 = 30;

/// Saves and restores session progress as JSON blobs.
///
/// Failures never reach the caller: saves and clears report `false`, loads
/// report `None`, and the cause is logged.
#[derive(Clone)]
pub struct ProgressStore {
    blobs: Arc<dyn BlobStore>,
    clock: Clock,
    user: Option<UserId>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, clock: Clock) -> Self {
        Self {
            blobs,
            clock,
            user: None,
        }
    }

    /// Namespace keys by the signed-in user; `None` means anonymous.
    #[must_use]
    pub fn with_user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    pub fn set_user(&mut self, user: Option<UserId>) {
        self.user = user;
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn storage_key(&self, session: &SessionKey) -> String {
        progress_key(self.user.as_ref(), session)
    }

    /// Persist the session's progress and stamp it with the save time.
    pub async fn save(&self, state: &mut SessionState, session: &SessionKey) -> bool {
        if session.is_empty() {
            warn!("cannot save progress without a session key");
            return false;
        }

        let now = self.clock.now();
        let key = self.storage_key(session);
        let json = match ProgressRecord::from_snapshot(&state.snapshot(), now).to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(%key, error = %err, "failed to encode progress");
                return false;
            }
        };

        match self.blobs.set(&key, &json).await {
            Ok(()) => {
                state.mark_saved(now);
                debug!(%key, index = state.current_index(), "progress saved");
                true
            }
            Err(err) => {
                warn!(%key, error = %err, "failed to save progress");
                false
            }
        }
    }

    /// Load saved progress. Progress older than seven days is removed and
    /// treated as absent.
    pub async fn load(&self, session: &SessionKey) -> Option<SessionSnapshot> {
        if session.is_empty() {
            return None;
        }

        let key = self.storage_key(session);
        let raw = match self.blobs.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(%key, error = %err, "failed to read progress");
                return None;
            }
        };

        let record = match ProgressRecord::from_json(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(%key, error = %err, "saved progress is unreadable");
                return None;
            }
        };

        if let Some(saved_at) = record.saved_at() {
            if self.clock.now() - saved_at > Duration::days(LOAD_MAX_AGE_DAYS) {
                info!(%key, %saved_at, "discarding stale progress");
                if let Err(err) = self.blobs.remove(&key).await {
                    warn!(%key, error = %err, "failed to remove stale progress");
                }
                return None;
            }
        }

        Some(record.into_snapshot())
    }

    pub async fn clear(&self, session: &SessionKey) -> bool {
        if session.is_empty() {
            return false;
        }
        let key = self.storage_key(session);
        match self.blobs.remove(&key).await {
            Ok(_) => {
                debug!(%key, "progress cleared");
                true
            }
            Err(err) => {
                warn!(%key, error = %err, "failed to clear progress");
                false
            }
        }
    }

    /// Whether a progress blob exists, regardless of its age.
    pub async fn has_saved(&self, session: &SessionKey) -> bool {
        if session.is_empty() {
            return false;
        }
        let key = self.storage_key(session);
        match self.blobs.get(&key).await {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(%key, error = %err, "failed to check saved progress");
                false
            }
        }
    }

    /// Remove progress of every user older than thirty days, plus blobs that
    /// no longer parse. Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> usize {
        let keys = match self.blobs.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "failed to list saved progress");
                return 0;
            }
        };

        let now = self.clock.now();
        let mut removed = 0;
        for key in keys.iter().filter(|key| is_progress_key(key)) {
            let expired = match self.blobs.get(key).await {
                Ok(Some(raw)) => match ProgressRecord::from_json(&raw) {
                    Ok(record) => record
                        .saved_at()
                        .is_some_and(|saved_at| now - saved_at > Duration::days(SWEEP_MAX_AGE_DAYS)),
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(err) => {
                    warn!(%key, error = %err, "failed to read progress during sweep");
                    false
                }
            };

            if expired {
                match self.blobs.remove(key).await {
                    Ok(true) => {
                        info!(%key, "evicted old progress");
                        removed += 1;
                    }
                    Ok(false) => {}
                    Err(err) => warn!(%key, error = %err, "failed to evict old progress"),
                }
            }
        }
        removed
    }
}
