use std::sync::Arc;

use tracing::info;

use storage::repository::Storage;
use study_core::model::UserId;

use crate::Clock;
use crate::error::AppServicesError;
use crate::grading::GradingService;
use crate::preferences_service::PreferencesService;
use crate::progress_store::ProgressStore;
use crate::sessions::StudyLoopService;

/// Assembles app-facing services over one storage backend.
///
/// Construction runs the expired-progress sweep once.
#[derive(Clone)]
pub struct StudyServices {
    preferences: Arc<PreferencesService>,
    study_loop: Arc<StudyLoopService>,
}

impl StudyServices {
    /// Build services backed by `SQLite` storage, grading with Gemini when
    /// `QUICKSTUDY_AI_API_KEY` is set.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// grader client cannot be built.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        user: Option<UserId>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let grading = GradingService::from_env()?;
        Ok(Self::with_storage(&storage, clock, user, grading).await)
    }

    /// Build services over in-memory storage.
    pub async fn in_memory(clock: Clock, grading: GradingService) -> Self {
        Self::with_storage(&Storage::in_memory(), clock, None, grading).await
    }

    pub async fn with_storage(
        storage: &Storage,
        clock: Clock,
        user: Option<UserId>,
        grading: GradingService,
    ) -> Self {
        let progress = ProgressStore::new(Arc::clone(&storage.blobs), clock).with_user(user);
        let evicted = progress.sweep_expired().await;
        if evicted > 0 {
            info!(evicted, "removed expired progress");
        }

        let preferences = Arc::new(PreferencesService::new(Arc::clone(&storage.blobs)));
        let study_loop = Arc::new(StudyLoopService::new(clock, progress, grading));

        Self {
            preferences,
            study_loop,
        }
    }

    #[must_use]
    pub fn preferences(&self) -> Arc<PreferencesService> {
        Arc::clone(&self.preferences)
    }

    #[must_use]
    pub fn study_loop(&self) -> Arc<StudyLoopService> {
        Arc::clone(&self.study_loop)
    }
}
