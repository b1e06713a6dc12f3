use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use services::{
    AnswerGrader, Clock, GradeSource, GradingError, GradingService, SessionError, StudyServices,
};
use storage::repository::Storage;
use study_core::model::{
    Catalog, CategorySelection, Preferences, QuestionKind, RawQuestionRow, UserId,
};
use study_core::time::fixed_now;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Accepts answers that contain the expected answer.
struct ContainsGrader {
    calls: AtomicUsize,
}

#[async_trait]
impl AnswerGrader for ContainsGrader {
    async fn grade(
        &self,
        user_answer: &str,
        correct_answer: &str,
        _question: &str,
    ) -> Result<bool, GradingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(user_answer
            .to_lowercase()
            .contains(&correct_answer.to_lowercase()))
    }
}

struct OfflineGrader;

#[async_trait]
impl AnswerGrader for OfflineGrader {
    async fn grade(&self, _: &str, _: &str, _: &str) -> Result<bool, GradingError> {
        Err(GradingError::Disabled)
    }
}

/// Never returns a verdict.
struct StalledGrader;

#[async_trait]
impl AnswerGrader for StalledGrader {
    async fn grade(&self, _: &str, _: &str, _: &str) -> Result<bool, GradingError> {
        std::future::pending().await
    }
}

fn row(text: &str, answer: &str, category: &str) -> RawQuestionRow {
    RawQuestionRow {
        text: text.into(),
        answer: answer.into(),
        category: Some(category.into()),
        target_secs: Some("20s".into()),
        ..RawQuestionRow::default()
    }
}

fn geography() -> Arc<Catalog> {
    let loaded = Catalog::from_rows(
        "presets/World Geography.csv",
        QuestionKind::FreeResponse,
        vec![
            row("Capital of France?", "Paris", "capitals"),
            row("Longest river?", "Nile", "rivers"),
            row("", "orphan answer", "capitals"),
            row("Capital of Japan?", "Tokyo", "capitals"),
        ],
    )
    .unwrap();
    assert_eq!(loaded.skipped.len(), 1);
    assert_eq!(loaded.skipped[0].index, 2);
    Arc::new(loaded.catalog)
}

async fn services_at(storage: &Storage, days_later: i64, grading: GradingService) -> StudyServices {
    StudyServices::with_storage(
        storage,
        Clock::fixed(fixed_now() + Duration::days(days_later)),
        None,
        grading,
    )
    .await
}

#[tokio::test]
async fn study_loop_grades_saves_and_finishes() {
    init_tracing();
    let storage = Storage::in_memory();
    let grader = Arc::new(ContainsGrader {
        calls: AtomicUsize::new(0),
    });
    let services = services_at(&storage, 0, GradingService::new(Some(grader.clone()))).await;
    let study = services.study_loop();
    let catalog = geography();

    let mut session = study
        .start_new(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    let mut current = study.present(&mut session).unwrap();
    let mut answered = 0;
    loop {
        let answer = match current.question.answer() {
            "Paris" => "paris ".to_string(),
            "Nile" => "the Nile river".to_string(),
            _ => "Kyoto".to_string(),
        };
        let feedback = study.answer_current(&mut session, &answer).await.unwrap();
        answered += 1;
        match current.question.answer() {
            "Paris" => assert_eq!(feedback.source, GradeSource::ExactMatch),
            "Nile" => assert!(feedback.is_correct),
            _ => assert!(!feedback.is_correct),
        }
        assert!(study.has_saved(&catalog).await);

        match study.next(&mut session).await.unwrap() {
            Some(next) => current = next,
            None => break,
        }
    }

    assert_eq!(answered, 3);
    assert_eq!(grader.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        study.next(&mut session).await.unwrap(),
        None,
        "a finished session stays finished"
    );

    let results = session.results().unwrap();
    assert_eq!(results.answered, 3);
    assert_eq!(results.correct, 2);
    assert_eq!(results.categories.len(), 2);

    let saved = study
        .progress_store()
        .load(&catalog.session_key())
        .await
        .expect("progress saved");
    assert_eq!(saved.current_index, 3);
    assert_eq!(saved.correct_answers, 2);
}

#[tokio::test]
async fn reload_continues_where_the_learner_left_off() {
    init_tracing();
    let storage = Storage::in_memory();
    let catalog = geography();

    let first = services_at(&storage, 0, GradingService::local_only()).await;
    let study = first.study_loop();
    let mut session = study
        .start_new(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    study.present(&mut session).unwrap();
    study.answer_current(&mut session, "Paris").await.unwrap();
    let expected_next = study
        .next(&mut session)
        .await
        .unwrap()
        .expect("more questions");

    // Same storage two days later, as after a page reload.
    let second = services_at(&storage, 2, GradingService::local_only()).await;
    let study = second.study_loop();
    let mut resumed = study
        .continue_or_start(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    assert!(resumed.is_resumed());
    assert_eq!(resumed.state().answered(), 1);
    assert_eq!(resumed.state().current_index(), 1);
    let shown = study.present(&mut resumed).unwrap();
    assert_eq!(shown.question, expected_next.question);
}

#[tokio::test]
async fn stale_progress_starts_fresh_and_start_new_clears() {
    init_tracing();
    let storage = Storage::in_memory();
    let catalog = geography();

    let first = services_at(&storage, 0, GradingService::local_only()).await;
    let study = first.study_loop();
    let mut session = study
        .start_new(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    study.present(&mut session).unwrap();
    study.answer_current(&mut session, "Paris").await.unwrap();
    assert!(study.has_saved(&catalog).await);

    let later = services_at(&storage, 8, GradingService::local_only()).await;
    let study = later.study_loop();
    let fresh = study
        .continue_or_start(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    assert!(!fresh.is_resumed());
    assert_eq!(fresh.state().answered(), 0);
    assert!(!study.has_saved(&catalog).await);

    let mut session = study
        .start_new(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    study.present(&mut session).unwrap();
    study.answer_current(&mut session, "Paris").await.unwrap();
    assert!(study.has_saved(&catalog).await);
    study
        .start_new(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    assert!(!study.has_saved(&catalog).await);
}

#[tokio::test]
async fn offline_grader_falls_back_to_local_heuristics() {
    init_tracing();
    let storage = Storage::in_memory();
    let services = services_at(&storage, 0, GradingService::new(Some(Arc::new(OfflineGrader)))).await;
    let study = services.study_loop();
    let catalog = Arc::new(
        Catalog::from_rows(
            "bio",
            QuestionKind::FreeResponse,
            vec![row("What do mitochondria do?", "cellular energy production", "cells")],
        )
        .unwrap()
        .catalog,
    );

    let mut session = study
        .start_new(catalog, CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    study.present(&mut session).unwrap();
    let feedback = study
        .answer_current(&mut session, "energy production")
        .await
        .unwrap();
    assert!(feedback.is_correct);
    assert_eq!(feedback.source, GradeSource::Fallback);
    assert!(!session.is_grading());
}

#[tokio::test]
async fn cancelled_grading_leaves_the_question_answerable() {
    init_tracing();
    let storage = Storage::in_memory();
    let services =
        services_at(&storage, 0, GradingService::new(Some(Arc::new(StalledGrader)))).await;
    let study = services.study_loop();
    let catalog = geography();

    let mut session = study
        .start_new(Arc::clone(&catalog), CategorySelection::All, Preferences::default())
        .await
        .unwrap();
    let shown = study.present(&mut session).unwrap();
    assert_eq!(shown.question.answer(), "Paris");

    tokio::select! {
        biased;
        _ = study.answer_current(&mut session, "somewhere in Europe") => {
            panic!("the grader never answers");
        }
        () = std::future::ready(()) => {}
    }

    assert!(!session.is_grading());
    assert_eq!(session.state().answered(), 0);
    assert_eq!(study.present(&mut session).unwrap(), shown);
    let feedback = study.answer_current(&mut session, "Paris").await.unwrap();
    assert_eq!(feedback.source, GradeSource::ExactMatch);
    assert_eq!(session.state().answered(), 1);
}

#[tokio::test]
async fn selection_changes_are_validated() {
    init_tracing();
    let storage = Storage::in_memory();
    let services = services_at(&storage, 0, GradingService::local_only()).await;
    let study = services.study_loop();
    let catalog = geography();

    let mut session = study
        .start_new(
            Arc::clone(&catalog),
            CategorySelection::only(["rivers"]),
            Preferences::default(),
        )
        .await
        .unwrap();
    assert_eq!(session.progress().total, 1);
    assert_eq!(study.present(&mut session).unwrap().question.text(), "Longest river?");

    let err = study
        .change_selection(&mut session, CategorySelection::only(Vec::<String>::new()))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::NoSelection);
    assert_eq!(session.progress().total, 1);

    study
        .change_selection(&mut session, CategorySelection::All)
        .await
        .unwrap();
    assert_eq!(session.progress().total, 3);
}

#[tokio::test]
async fn sqlite_services_sweep_old_progress_and_keep_preferences() {
    init_tracing();
    let storage = Storage::sqlite("sqlite:file:memdb_services_sweep?mode=memory&cache=shared")
        .await
        .expect("storage");
    let catalog = geography();
    let user = UserId::new("ada").unwrap();

    let then = StudyServices::with_storage(
        &storage,
        Clock::fixed(fixed_now()),
        Some(user.clone()),
        GradingService::local_only(),
    )
    .await;
    let prefs = Preferences::default().with_time_scoring(false);
    assert!(then.preferences().save(&prefs).await);
    let study = then.study_loop();
    let mut session = study
        .start_new(Arc::clone(&catalog), CategorySelection::All, prefs.clone())
        .await
        .unwrap();
    study.present(&mut session).unwrap();
    study.answer_current(&mut session, "Paris").await.unwrap();
    assert_eq!(
        storage.blobs.keys().await.unwrap(),
        vec!["progress_ada_world_geography", "quickstudy_preferences"]
    );

    let month_later = StudyServices::with_storage(
        &storage,
        Clock::fixed(fixed_now() + Duration::days(31)),
        Some(user),
        GradingService::local_only(),
    )
    .await;
    assert_eq!(
        storage.blobs.keys().await.unwrap(),
        vec!["quickstudy_preferences"]
    );
    assert_eq!(month_later.preferences().load().await, prefs);
}
