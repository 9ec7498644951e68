//! Case Workflow Integration Tests
//!
//! Drives a case from intake to the patient translation through the
//! `CaseSession`, including guard violations and failed runs.

use std::sync::Arc;

use scan_review::models::snapshot::STATE_NAMESPACE;
use scan_review::services::workflow::{CaseSession, WorkflowAction, WorkflowPolicy};
use scan_review::storage::{MemoryStateStore, StateStore};
use scan_review::AppError;
use scan_review_core::{CaseStatus, Confidence, Persona, ReviewStatus};

use crate::support::{
    finding, images, scheduler, slice_json, started_session, MockVisionProvider, EXAM_TITLE,
};

fn cyst_provider() -> Arc<MockVisionProvider> {
    MockVisionProvider::new()
        .reply(
            "Image 1",
            slice_json(true, "T2", vec![finding("Cyst", "Medium", "Left Ovary", "Simple cyst.")]),
        )
        .reply(
            "Image 2",
            slice_json(true, "T2", vec![finding("Cyst", "High", "Left Ovary", "Thin wall.")]),
        )
        .into_arc()
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_case_from_intake_to_patient_translation() {
    let provider = cyst_provider();
    let (mut session, store) = started_session();
    session.update_intake(None, Some("Pelvic pain")).unwrap();

    let case = session
        .run_analysis(&scheduler(&provider), &images(2), None, None)
        .await
        .unwrap();
    assert_eq!(case.clinical_context, "Pelvic pain");
    assert_eq!(case.findings.len(), 1);
    let cyst = &case.findings[0];
    assert_eq!(cyst.likelihood, Confidence::High);
    assert_eq!(cyst.best_image_id, "img-2");
    assert_eq!(session.best_image_for("finding-1").unwrap().label, "Image 2");

    let case = session.accept_finding("finding-1").unwrap();
    assert_eq!(case.findings[0].review_status, ReviewStatus::Accepted);
    assert!(case.final_report_text.contains(&format!("EXAM: {}", EXAM_TITLE)));
    assert!(case.final_report_text.contains("CLINICAL INDICATION: Pelvic pain"));
    assert!(case.final_report_text.ends_with(
        "- Left Ovary: Cyst. Simple cyst. (Observed in images: 1, 2) (High confidence)\n"
    ));

    session.submit_for_review("dr.peer", "Second look please").unwrap();
    session.set_persona(Persona::Peer).unwrap();
    let case = session.submit_review("Agree with the cyst.").unwrap();
    assert_eq!(case.status, CaseStatus::Reviewed);

    session.set_persona(Persona::Primary).unwrap();
    let case = session.finalize().unwrap();
    assert_eq!(case.status, CaseStatus::Finalized);

    session.set_persona(Persona::Patient).unwrap();
    assert_eq!(session.patient_view().unwrap(), case.final_report_text);
    assert_eq!(
        session.reviewer_notes().unwrap().as_deref(),
        Some("Agree with the cyst.")
    );

    let translation = session.translate_for_patient(provider.as_ref()).await.unwrap();
    assert_eq!(translation.summary, "Your scan shows a small cyst.");
    assert_eq!(translation.resources[0].source, "NIH");

    let calls_before = provider.call_count();
    let cached = session.translate_for_patient(provider.as_ref()).await.unwrap();
    assert_eq!(cached, translation);
    assert_eq!(provider.call_count(), calls_before);

    let saved = store.load(STATE_NAMESPACE).unwrap().unwrap();
    assert_eq!(&saved, session.snapshot());
}

// ============================================================================
// Guards
// ============================================================================

#[tokio::test]
async fn test_peer_cannot_submit_review_on_draft() {
    let (mut session, store) = started_session();
    session.set_persona(Persona::Peer).unwrap();
    let before = store.load(STATE_NAMESPACE).unwrap();

    let error = session.submit_review("Looks fine").unwrap_err();

    match error {
        AppError::WorkflowGuard(violation) => {
            assert_eq!(violation.action, WorkflowAction::SubmitReview);
            assert_eq!(violation.persona, Persona::Peer);
            assert_eq!(violation.status, CaseStatus::Draft);
        }
        other => panic!("expected guard violation, got {other:?}"),
    }
    assert_eq!(session.case().unwrap().status, CaseStatus::Draft);
    assert_eq!(store.load(STATE_NAMESPACE).unwrap(), before);
}

#[tokio::test]
async fn test_peer_cannot_run_analysis() {
    let provider = cyst_provider();
    let (mut session, _) = started_session();
    session.set_persona(Persona::Peer).unwrap();

    let result = session
        .run_analysis(&scheduler(&provider), &images(2), None, None)
        .await;

    assert!(result.unwrap_err().is_guard_violation());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_strict_policy_requires_review_before_finalize() {
    let store = Arc::new(MemoryStateStore::new());
    let policy = WorkflowPolicy {
        require_peer_review: true,
    };
    let mut session = CaseSession::open(store, policy, EXAM_TITLE).unwrap();
    session.start_case().unwrap();

    assert!(session.finalize().unwrap_err().is_guard_violation());

    session.submit_for_review("dr.peer", "").unwrap();
    session.set_persona(Persona::Peer).unwrap();
    session.submit_review("ok").unwrap();
    session.set_persona(Persona::Primary).unwrap();
    assert_eq!(session.finalize().unwrap().status, CaseStatus::Finalized);
}

#[tokio::test]
async fn test_permissive_policy_finalizes_from_draft() {
    let (mut session, _) = started_session();
    let case = session.finalize().unwrap();
    assert_eq!(case.status, CaseStatus::Finalized);
    assert!(case.final_report_text.starts_with("EXAM:"));
    assert!(session.submit_for_review("dr.peer", "").unwrap_err().is_guard_violation());
}

#[tokio::test]
async fn test_translation_locked_until_finalized() {
    let provider = MockVisionProvider::new().into_arc();
    let (mut session, _) = started_session();

    let result = session.translate_for_patient(provider.as_ref()).await;

    assert!(result.unwrap_err().is_guard_violation());
    assert_eq!(provider.call_count(), 0);
}

// ============================================================================
// Failed operations
// ============================================================================

#[tokio::test]
async fn test_failed_rerun_keeps_previous_analysis() {
    let (mut session, store) = started_session();
    let first = session
        .run_analysis(&scheduler(&cyst_provider()), &images(2), Some("first"), None)
        .await
        .unwrap();
    let saved = store.load(STATE_NAMESPACE).unwrap();

    let failing = MockVisionProvider::new().fail("Image 3").into_arc();
    let result = session
        .run_analysis(&scheduler(&failing), &images(5), Some("second"), None)
        .await;

    assert!(matches!(result, Err(AppError::AnalysisAborted { .. })));
    assert_eq!(session.case().unwrap(), &first);
    assert_eq!(session.case().unwrap().clinical_context, "first");
    assert_eq!(store.load(STATE_NAMESPACE).unwrap(), saved);
}

#[tokio::test]
async fn test_blank_context_is_stored_as_na() {
    let (mut session, _) = started_session();
    let case = session
        .run_analysis(&scheduler(&cyst_provider()), &images(1), Some("  "), None)
        .await
        .unwrap();
    assert_eq!(case.clinical_context, "NA");
    assert!(session
        .report_text()
        .unwrap()
        .contains("CLINICAL INDICATION: Clinical History not provided"));
}

#[tokio::test]
async fn test_rerun_replaces_findings_but_keeps_report() {
    let (mut session, _) = started_session();
    session
        .run_analysis(&scheduler(&cyst_provider()), &images(2), None, None)
        .await
        .unwrap();
    let report = session.accept_finding("finding-1").unwrap().final_report_text;

    let other = MockVisionProvider::new()
        .reply(
            "Image 1",
            slice_json(true, "T2", vec![finding("Adhesion", "Low", "Pouch of Douglas", "x")]),
        )
        .into_arc();
    let case = session
        .run_analysis(&scheduler(&other), &images(1), None, None)
        .await
        .unwrap();

    assert_eq!(case.findings.len(), 1);
    assert_eq!(case.findings[0].title, "Adhesion");
    assert_eq!(case.findings[0].review_status, ReviewStatus::Pending);
    assert_eq!(case.final_report_text, report);
}

#[tokio::test]
async fn test_zero_valid_run_is_stored() {
    let provider = MockVisionProvider::new()
        .reply("Image 1", slice_json(false, "Knee MRI", vec![]))
        .into_arc();
    let (mut session, _) = started_session();

    let case = session
        .run_analysis(&scheduler(&provider), &images(1), None, None)
        .await
        .unwrap();

    let metadata = case.analysis_metadata.unwrap();
    assert!(!metadata.is_valid_modality);
    assert_eq!(metadata.modality_description, "Knee MRI");
    assert!(case.findings.is_empty());
}

#[tokio::test]
async fn test_failed_translation_leaves_case_untouched() {
    let provider = MockVisionProvider::new().fail_translation().into_arc();
    let (mut session, _) = started_session();
    session.update_report("FINDINGS: none").unwrap();
    let finalized = session.finalize().unwrap();

    let result = session.translate_for_patient(provider.as_ref()).await;

    assert!(matches!(result, Err(AppError::Inference(_))));
    assert_eq!(session.case().unwrap(), &finalized);
    assert!(session.case().unwrap().patient_translation.is_none());
}

#[tokio::test]
async fn test_run_requires_patient_reference() {
    let store = Arc::new(MemoryStateStore::new());
    let mut session = CaseSession::open(store, WorkflowPolicy::default(), EXAM_TITLE).unwrap();
    let provider = cyst_provider();

    let result = session
        .run_analysis(&scheduler(&provider), &images(1), None, None)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(provider.call_count(), 0);
}
