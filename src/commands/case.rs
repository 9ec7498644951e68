//! Case Commands
//!
//! Intake, analysis, review and finalization of the live case.

use std::path::PathBuf;

use tokio::sync::mpsc;

use scan_review_core::{CaseRecord, ImageRef, PatientTranslation, Persona};

use crate::models::image::ScanImage;
use crate::services::analysis::AnalysisProgress;
use crate::services::workflow::WorkflowAction;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

// ============================================================================
// Intake
// ============================================================================

/// Get the live case, if any
pub async fn get_case(state: &AppState) -> AppResult<Option<CaseRecord>> {
    Ok(state.session().await?.case().cloned())
}

/// Start a new case, replacing the current one
pub async fn start_case(state: &AppState) -> AppResult<CaseRecord> {
    state.session().await?.start_case()
}

/// Edit the patient reference and/or clinical context
pub async fn update_intake(
    state: &AppState,
    patient_ref: Option<String>,
    clinical_context: Option<String>,
) -> AppResult<CaseRecord> {
    state
        .session()
        .await?
        .update_intake(patient_ref.as_deref(), clinical_context.as_deref())
}

/// Switch the acting persona
pub async fn set_persona(state: &AppState, persona: Persona) -> AppResult<Persona> {
    state.session().await?.set_persona(persona)
}

/// Actions the acting persona may take right now
pub async fn available_actions(state: &AppState) -> AppResult<Vec<WorkflowAction>> {
    Ok(state.session().await?.available_actions())
}

// ============================================================================
// Analysis
// ============================================================================

/// Analyse already loaded images
pub async fn run_analysis(
    state: &AppState,
    images: Vec<ScanImage>,
    clinical_context: Option<String>,
    progress: Option<mpsc::Sender<AnalysisProgress>>,
) -> AppResult<CaseRecord> {
    let scheduler = state.scheduler().await?;
    state
        .session()
        .await?
        .run_analysis(
            &scheduler,
            &images,
            clinical_context.as_deref(),
            progress.as_ref(),
        )
        .await
}

/// Load images from disk, in the given order, and analyse them
pub async fn analyze_files(
    state: &AppState,
    paths: Vec<PathBuf>,
    clinical_context: Option<String>,
    progress: Option<mpsc::Sender<AnalysisProgress>>,
) -> AppResult<CaseRecord> {
    let images = ScanImage::load_series(&paths)?;
    run_analysis(state, images, clinical_context, progress).await
}

/// Drop the analysis results, keeping intake and report
pub async fn reset_analysis(state: &AppState) -> AppResult<CaseRecord> {
    state.session().await?.reset_analysis()
}

// ============================================================================
// Findings & Report
// ============================================================================

pub async fn accept_finding(state: &AppState, finding_id: &str) -> AppResult<CaseRecord> {
    state.session().await?.accept_finding(finding_id)
}

pub async fn reject_finding(state: &AppState, finding_id: &str) -> AppResult<CaseRecord> {
    state.session().await?.reject_finding(finding_id)
}

pub async fn update_report(state: &AppState, text: &str) -> AppResult<CaseRecord> {
    state.session().await?.update_report(text)
}

pub async fn update_reviewer_notes(state: &AppState, text: &str) -> AppResult<CaseRecord> {
    state.session().await?.update_reviewer_notes(text)
}

/// Report text as the acting persona may see it
pub async fn get_report(state: &AppState) -> AppResult<String> {
    state.session().await?.report_text()
}

pub async fn get_reviewer_notes(state: &AppState) -> AppResult<Option<String>> {
    state.session().await?.reviewer_notes()
}

/// The finalized report as shown to the patient
pub async fn get_patient_view(state: &AppState) -> AppResult<String> {
    state.session().await?.patient_view()
}

pub async fn get_best_image(state: &AppState, finding_id: &str) -> AppResult<ImageRef> {
    state.session().await?.best_image_for(finding_id)
}

// ============================================================================
// Transitions
// ============================================================================

/// Request a peer review. Falls back to the configured default reviewer.
pub async fn submit_for_review(
    state: &AppState,
    reviewer_id: Option<String>,
    note: &str,
) -> AppResult<CaseRecord> {
    let reviewer = match reviewer_id {
        Some(reviewer) => reviewer,
        None => state
            .get_config()
            .await?
            .default_reviewer
            .ok_or_else(|| AppError::validation("A reviewer must be selected"))?,
    };
    state.session().await?.submit_for_review(&reviewer, note)
}

pub async fn submit_review(state: &AppState, notes: &str) -> AppResult<CaseRecord> {
    state.session().await?.submit_review(notes)
}

pub async fn finalize(state: &AppState) -> AppResult<CaseRecord> {
    state.session().await?.finalize()
}

/// Plain-language version of the finalized report
pub async fn translate_for_patient(state: &AppState) -> AppResult<PatientTranslation> {
    let provider = state.provider().await?;
    state
        .session()
        .await?
        .translate_for_patient(provider.as_ref())
        .await
}
