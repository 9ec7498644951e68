//! Persistence Integration Tests
//!
//! Snapshots written through the SQLite store survive a restart, and the
//! command layer drives the same workflow over `AppState`.

use std::sync::Arc;

use tokio::sync::mpsc;

use scan_review::commands;
use scan_review::models::response::CommandResponse;
use scan_review::models::snapshot::STATE_NAMESPACE;
use scan_review::services::workflow::{CaseSession, WorkflowPolicy};
use scan_review::storage::{Database, StateStore};
use scan_review::{AppError, AppState};
use scan_review_core::{CaseRecord, CaseStatus, Persona};

use crate::support::{finding, images, scheduler, slice_json, MockVisionProvider, EXAM_TITLE};

#[tokio::test]
async fn test_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let provider = MockVisionProvider::new()
        .reply(
            "Image 2",
            slice_json(true, "T2", vec![finding("Cyst", "Low", "Left Ovary", "Small.")]),
        )
        .into_arc();

    let snapshot = {
        let store = Arc::new(Database::open(&db_path).unwrap());
        let mut session = CaseSession::open(store, WorkflowPolicy::default(), EXAM_TITLE).unwrap();
        session.start_case().unwrap();
        session
            .run_analysis(&scheduler(&provider), &images(3), Some("history"), None)
            .await
            .unwrap();
        session.accept_finding("finding-1").unwrap();
        session.set_persona(Persona::Peer).unwrap();
        session.snapshot().clone()
    };

    let store = Arc::new(Database::open(&db_path).unwrap());
    let reopened = CaseSession::open(store, WorkflowPolicy::default(), EXAM_TITLE).unwrap();

    assert_eq!(reopened.snapshot(), &snapshot);
    assert_eq!(reopened.acting_persona(), Persona::Peer);
    let case = reopened.case().unwrap();
    assert_eq!(case.images.len(), 3);
    assert_eq!(case.findings[0].best_image_id, "img-2");
}

#[tokio::test]
async fn test_unreadable_snapshot_is_an_error() {
    let db = Database::new_in_memory().unwrap();
    db.put_state_payload(STATE_NAMESPACE, "{not json").unwrap();

    let result = CaseSession::open(Arc::new(db), WorkflowPolicy::default(), EXAM_TITLE);
    assert!(matches!(result, Err(AppError::Serialization(_))));
}

#[tokio::test]
async fn test_empty_store_opens_without_case() {
    let db = Arc::new(Database::new_in_memory().unwrap());
    let session = CaseSession::open(db.clone(), WorkflowPolicy::default(), EXAM_TITLE).unwrap();

    assert!(session.case().is_none());
    assert_eq!(session.acting_persona(), Persona::Primary);
    assert!(db.load(STATE_NAMESPACE).unwrap().is_none());
}

// ============================================================================
// Commands over AppState
// ============================================================================

async fn app_state(provider: Arc<MockVisionProvider>) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new();
    state.initialize_in(dir.path()).await.unwrap();
    state.set_provider(provider).await;
    (state, dir)
}

#[tokio::test]
async fn test_commands_drive_the_workflow() {
    let provider = MockVisionProvider::new()
        .reply(
            "Image 1",
            slice_json(true, "T2", vec![finding("Cyst", "Medium", "Left Ovary", "Simple.")]),
        )
        .into_arc();
    let (state, _dir) = app_state(provider.clone()).await;

    commands::start_case(&state).await.unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let case = commands::run_analysis(&state, images(2), Some("pain".to_string()), Some(tx))
        .await
        .unwrap();
    assert_eq!(case.findings.len(), 1);
    let mut last = 0;
    while let Some(event) = rx.recv().await {
        last = event.percent;
    }
    assert_eq!(last, 100);

    commands::accept_finding(&state, "finding-1").await.unwrap();
    commands::submit_for_review(&state, Some("dr.peer".to_string()), "")
        .await
        .unwrap();
    commands::set_persona(&state, Persona::Peer).await.unwrap();

    let denied: CommandResponse<CaseRecord> =
        commands::update_report(&state, "peer edit").await.into();
    assert!(!denied.success);
    assert!(denied.error.unwrap().contains("peer cannot"));

    commands::submit_review(&state, "Agree").await.unwrap();
    commands::set_persona(&state, Persona::Primary).await.unwrap();
    let case = commands::finalize(&state).await.unwrap();
    assert_eq!(case.status, CaseStatus::Finalized);

    let translation = commands::translate_for_patient(&state).await.unwrap();
    assert!(!translation.summary.is_empty());
    assert_eq!(
        commands::get_patient_view(&state).await.unwrap(),
        case.final_report_text
    );
}

#[tokio::test]
async fn test_default_reviewer_from_settings() {
    let (state, _dir) = app_state(MockVisionProvider::new().into_arc()).await;
    commands::update_settings(
        &state,
        scan_review::SettingsUpdate {
            default_reviewer: Some("dr.default".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    commands::start_case(&state).await.unwrap();
    let case = commands::submit_for_review(&state, None, "").await.unwrap();
    assert_eq!(case.assigned_reviewer.as_deref(), Some("dr.default"));
}
