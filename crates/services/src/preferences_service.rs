use std::sync::Arc;

use tracing::{debug, warn};

use storage::records::PreferencesRecord;
use storage::repository::BlobStore;
use study_core::model::{PREFERENCES_KEY, Preferences};

/// Loads and stores app-wide preferences. The blob never expires.
#[derive(Clone)]
pub struct PreferencesService {
    blobs: Arc<dyn BlobStore>,
}

impl PreferencesService {
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Saved preferences, or defaults when none are stored or they cannot be read.
    pub async fn load(&self) -> Preferences {
        let raw = match self.blobs.get(PREFERENCES_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Preferences::default(),
            Err(err) => {
                warn!(error = %err, "failed to read preferences");
                return Preferences::default();
            }
        };

        match PreferencesRecord::from_json(&raw) {
            Ok(record) => {
                let requested = record.required_correct_answers;
                let prefs = record.into_preferences();
                if requested.is_some_and(|streak| streak != i64::from(prefs.required_streak())) {
                    debug!(?requested, applied = prefs.required_streak(), "required streak clamped");
                }
                prefs
            }
            Err(err) => {
                warn!(error = %err, "saved preferences are unreadable");
                Preferences::default()
            }
        }
    }

    pub async fn save(&self, preferences: &Preferences) -> bool {
        let json = match PreferencesRecord::from(preferences).to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to encode preferences");
                return false;
            }
        };
        match self.blobs.set(PREFERENCES_KEY, &json).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to save preferences");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryBlobStore;

    fn service() -> (Arc<dyn BlobStore>, PreferencesService) {
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        (Arc::clone(&blobs), PreferencesService::new(blobs))
    }

    #[tokio::test]
    async fn missing_preferences_load_defaults() {
        let (_, prefs) = service();
        assert_eq!(prefs.load().await, Preferences::default());
    }

    #[tokio::test]
    async fn saved_preferences_round_trip() {
        let (_, prefs) = service();
        let custom = Preferences::default()
            .with_adaptive_mastery(false)
            .with_required_streak(8);
        assert!(prefs.save(&custom).await);
        assert_eq!(prefs.load().await, custom);
    }

    #[tokio::test]
    async fn stored_blob_uses_camel_case_fields() {
        let (blobs, prefs) = service();
        assert!(prefs.save(&Preferences::default().with_dark_mode(true)).await);
        let raw = blobs.get(PREFERENCES_KEY).await.unwrap().unwrap();
        assert!(raw.contains("\"isDarkMode\":true"));
        assert!(raw.contains("\"requiredCorrectAnswers\":10"));
    }

    #[tokio::test]
    async fn out_of_range_streak_is_clamped() {
        let (blobs, prefs) = service();
        blobs
            .set(PREFERENCES_KEY, r#"{"requiredCorrectAnswers":2}"#)
            .await
            .unwrap();
        assert_eq!(prefs.load().await.required_streak(), 5);
    }

    #[tokio::test]
    async fn corrupt_preferences_load_defaults() {
        let (blobs, prefs) = service();
        blobs.set(PREFERENCES_KEY, "[").await.unwrap();
        assert_eq!(prefs.load().await, Preferences::default());
    }
}
