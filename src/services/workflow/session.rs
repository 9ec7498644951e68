//! Case Session
//!
//! The explicit context object holding the single live case and the acting
//! persona. Every operation validates against the workflow guards, applies
//! its change to a copy of the case, saves the whole snapshot, and only then
//! swaps the copy in. A failed operation therefore neither mutates nor saves.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use rand::Rng;
use tokio::sync::mpsc;

use scan_review_core::{CaseRecord, ImageRef, PatientTranslation, Persona, ReviewStatus};
use scan_review_llm::LlmProvider;

use super::machine::{WorkflowAction, WorkflowPolicy};
use crate::models::image::ScanImage;
use crate::models::snapshot::{AppSnapshot, STATE_NAMESPACE};
use crate::services::analysis::prompt::normalize_context;
use crate::services::analysis::{AnalysisProgress, SliceAnalysisScheduler};
use crate::services::report::{append_finding, ensure_report, report_template};
use crate::services::translation::translate_report;
use crate::storage::state_store::StateStore;
use crate::utils::error::{AppError, AppResult};

/// Anonymous patient reference: `ANON-<year>-<4 digits>`.
pub fn generate_patient_ref() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("ANON-{}-{}", Utc::now().year(), suffix)
}

/// Who is acting, under which policy.
struct Actor<'a> {
    persona: Persona,
    policy: WorkflowPolicy,
    exam_title: &'a str,
}

impl Actor<'_> {
    fn check(&self, action: WorkflowAction, case: &CaseRecord) -> AppResult<()> {
        self.policy
            .check(action, self.persona, case.status)
            .map_err(|violation| {
                tracing::warn!(case_id = %case.id, error = %violation, "workflow guard violation");
                AppError::from(violation)
            })
    }

    fn transition(&self, action: WorkflowAction, case: &mut CaseRecord) -> AppResult<()> {
        let from = case.status;
        let to = self
            .policy
            .transition(action, self.persona, from)
            .map_err(|violation| {
                tracing::warn!(case_id = %case.id, error = %violation, "workflow guard violation");
                AppError::from(violation)
            })?;
        case.status = to;
        tracing::info!(case_id = %case.id, from = %from, to = %to, persona = %self.persona, "case transition");
        Ok(())
    }
}

pub struct CaseSession {
    store: Arc<dyn StateStore>,
    snapshot: AppSnapshot,
    policy: WorkflowPolicy,
    exam_title: String,
}

impl CaseSession {
    /// Open a session, loading any snapshot saved under the fixed namespace.
    pub fn open(
        store: Arc<dyn StateStore>,
        policy: WorkflowPolicy,
        exam_title: impl Into<String>,
    ) -> AppResult<Self> {
        let snapshot = store.load(STATE_NAMESPACE)?.unwrap_or_default();
        tracing::debug!(
            has_case = snapshot.case.is_some(),
            persona = %snapshot.acting_persona,
            "case session opened"
        );
        Ok(Self {
            store,
            snapshot,
            policy,
            exam_title: exam_title.into(),
        })
    }

    pub fn policy(&self) -> WorkflowPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: WorkflowPolicy) {
        self.policy = policy;
    }

    pub fn set_exam_title(&mut self, exam_title: impl Into<String>) {
        self.exam_title = exam_title.into();
    }

    pub fn snapshot(&self) -> &AppSnapshot {
        &self.snapshot
    }

    pub fn case(&self) -> Option<&CaseRecord> {
        self.snapshot.case.as_ref()
    }

    pub fn acting_persona(&self) -> Persona {
        self.snapshot.acting_persona
    }

    /// Actions the acting persona may take on the current case.
    pub fn available_actions(&self) -> Vec<WorkflowAction> {
        match self.case() {
            Some(case) => self.policy.available_actions(self.acting_persona(), case.status),
            None => Vec::new(),
        }
    }

    fn require_case(&self) -> AppResult<&CaseRecord> {
        self.case()
            .ok_or_else(|| AppError::validation("No active case. Start a new case first"))
    }

    fn actor(&self) -> Actor<'_> {
        Actor {
            persona: self.snapshot.acting_persona,
            policy: self.policy,
            exam_title: &self.exam_title,
        }
    }

    fn commit(&mut self, next: AppSnapshot) -> AppResult<()> {
        self.store.save(STATE_NAMESPACE, &next)?;
        self.snapshot = next;
        Ok(())
    }

    /// Apply `f` to a copy of the case and commit it if `f` succeeds.
    fn mutate<F>(&mut self, f: F) -> AppResult<CaseRecord>
    where
        F: FnOnce(&mut CaseRecord, &Actor<'_>) -> AppResult<()>,
    {
        let mut case = self.require_case()?.clone();
        f(&mut case, &self.actor())?;
        self.commit(AppSnapshot {
            case: Some(case.clone()),
            acting_persona: self.snapshot.acting_persona,
        })?;
        Ok(case)
    }

    // ========================================================================
    // Intake
    // ========================================================================

    /// Switch the acting persona.
    pub fn set_persona(&mut self, persona: Persona) -> AppResult<Persona> {
        self.commit(AppSnapshot {
            case: self.snapshot.case.clone(),
            acting_persona: persona,
        })?;
        tracing::info!(persona = %persona, "acting persona changed");
        Ok(persona)
    }

    /// Replace the live case with a fresh draft. Only Primary may discard an
    /// existing case.
    pub fn start_case(&mut self) -> AppResult<CaseRecord> {
        if let Some(current) = self.case() {
            self.actor().check(WorkflowAction::StartCase, current)?;
        }
        let case = CaseRecord::new(uuid::Uuid::new_v4().to_string(), generate_patient_ref());
        self.commit(AppSnapshot {
            case: Some(case.clone()),
            acting_persona: Persona::Primary,
        })?;
        tracing::info!(case_id = %case.id, patient_ref = %case.patient_ref, "case started");
        Ok(case)
    }

    /// Edit the intake fields. `None` leaves a field unchanged.
    pub fn update_intake(
        &mut self,
        patient_ref: Option<&str>,
        clinical_context: Option<&str>,
    ) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::EditIntake, case)?;
            if let Some(patient_ref) = patient_ref {
                let patient_ref = patient_ref.trim();
                if patient_ref.is_empty() {
                    return Err(AppError::validation("Patient reference cannot be empty"));
                }
                case.patient_ref = patient_ref.to_string();
            }
            if let Some(context) = clinical_context {
                case.clinical_context = context.trim().to_string();
            }
            Ok(())
        })
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Analyse `images` and store the result on the case.
    ///
    /// `clinical_context` overrides the intake context when given. On any
    /// failure the case, including a previous analysis, is left untouched.
    pub async fn run_analysis(
        &mut self,
        scheduler: &SliceAnalysisScheduler,
        images: &[ScanImage],
        clinical_context: Option<&str>,
        progress: Option<&mpsc::Sender<AnalysisProgress>>,
    ) -> AppResult<CaseRecord> {
        let case = self.require_case()?;
        self.actor().check(WorkflowAction::RunAnalysis, case)?;
        if case.patient_ref.trim().is_empty() {
            return Err(AppError::validation(
                "Please generate a patient reference to proceed",
            ));
        }
        let case_id = case.id.clone();
        let context = normalize_context(clinical_context.unwrap_or(case.clinical_context.as_str()));

        let outcome = match scheduler.run(images, &context, progress).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(case_id = %case_id, error = %e, "analysis failed; case unchanged");
                return Err(e);
            }
        };

        let updated = self.mutate(move |case, _| {
            case.clinical_context = context;
            case.clear_analysis();
            case.analysis_metadata = Some(outcome.metadata);
            case.findings = outcome.findings;
            case.images = outcome.images;
            Ok(())
        })?;
        tracing::info!(
            case_id = %updated.id,
            findings = updated.findings.len(),
            "analysis stored"
        );
        Ok(updated)
    }

    /// Clear findings, metadata and images. Intake, report and status stay.
    pub fn reset_analysis(&mut self) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::ResetAnalysis, case)?;
            case.clear_analysis();
            Ok(())
        })
    }

    // ========================================================================
    // Findings & Report
    // ========================================================================

    /// Append a finding to the report and mark it accepted.
    /// Accepting an already accepted finding changes nothing.
    pub fn accept_finding(&mut self, finding_id: &str) -> AppResult<CaseRecord> {
        let case = self.require_case()?;
        self.actor().check(WorkflowAction::AcceptFinding, case)?;
        let finding = case
            .finding(finding_id)
            .ok_or_else(|| AppError::not_found(format!("Finding {}", finding_id)))?;
        if finding.review_status == ReviewStatus::Accepted {
            return Ok(case.clone());
        }

        self.mutate(|case, actor| {
            ensure_report(actor.exam_title, case);
            let finding = case
                .finding_mut(finding_id)
                .ok_or_else(|| AppError::not_found(format!("Finding {}", finding_id)))?;
            finding.review_status = ReviewStatus::Accepted;
            let finding = finding.clone();
            append_finding(&mut case.final_report_text, &finding);
            tracing::debug!(case_id = %case.id, finding_id, "finding accepted");
            Ok(())
        })
    }

    /// Mark a finding rejected. The report is not touched.
    pub fn reject_finding(&mut self, finding_id: &str) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::RejectFinding, case)?;
            let finding = case
                .finding_mut(finding_id)
                .ok_or_else(|| AppError::not_found(format!("Finding {}", finding_id)))?;
            finding.review_status = ReviewStatus::Rejected;
            Ok(())
        })
    }

    /// Replace the report text.
    pub fn update_report(&mut self, text: &str) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::EditReport, case)?;
            case.final_report_text = text.to_string();
            Ok(())
        })
    }

    /// Replace the reviewer notes (Peer, during review).
    pub fn update_reviewer_notes(&mut self, text: &str) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::EditReviewerNotes, case)?;
            case.reviewer_note = Some(text.to_string());
            Ok(())
        })
    }

    /// Current report text, or the template preview when none was written.
    pub fn report_text(&self) -> AppResult<String> {
        let case = self.require_case()?;
        self.actor().check(WorkflowAction::ViewReport, case)?;
        if case.final_report_text.trim().is_empty() {
            Ok(report_template(&self.exam_title, case))
        } else {
            Ok(case.final_report_text.clone())
        }
    }

    pub fn reviewer_notes(&self) -> AppResult<Option<String>> {
        let case = self.require_case()?;
        self.actor().check(WorkflowAction::ViewReviewerNotes, case)?;
        Ok(case.reviewer_note.clone())
    }

    /// The report as the patient sees it. Only available once finalized.
    pub fn patient_view(&self) -> AppResult<String> {
        let case = self.require_case()?;
        let patient = Actor {
            persona: Persona::Patient,
            policy: self.policy,
            exam_title: &self.exam_title,
        };
        patient.check(WorkflowAction::ViewReport, case)?;
        Ok(case.final_report_text.clone())
    }

    /// The image a finding was seen most confidently on.
    pub fn best_image_for(&self, finding_id: &str) -> AppResult<ImageRef> {
        let case = self.require_case()?;
        let finding = case
            .finding(finding_id)
            .ok_or_else(|| AppError::not_found(format!("Finding {}", finding_id)))?;
        case.image(&finding.best_image_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Image {}", finding.best_image_id)))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Primary asks a peer for a second opinion.
    pub fn submit_for_review(&mut self, reviewer_id: &str, note: &str) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::SubmitForReview, case)?;
            let reviewer_id = reviewer_id.trim();
            if reviewer_id.is_empty() {
                return Err(AppError::validation("A reviewer must be selected"));
            }
            ensure_report(actor.exam_title, case);
            actor.transition(WorkflowAction::SubmitForReview, case)?;
            case.assigned_reviewer = Some(reviewer_id.to_string());
            case.review_request_note = Some(note.trim().to_string()).filter(|n| !n.is_empty());
            Ok(())
        })
    }

    /// Peer returns the review. Notes are required.
    pub fn submit_review(&mut self, notes: &str) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::SubmitReview, case)?;
            if notes.trim().is_empty() {
                return Err(AppError::validation(
                    "Please enter second opinion notes before submitting",
                ));
            }
            actor.transition(WorkflowAction::SubmitReview, case)?;
            case.reviewer_note = Some(notes.trim().to_string());
            Ok(())
        })
    }

    /// Freeze the report and unlock the patient translation.
    pub fn finalize(&mut self) -> AppResult<CaseRecord> {
        self.mutate(|case, actor| {
            actor.check(WorkflowAction::Finalize, case)?;
            ensure_report(actor.exam_title, case);
            actor.transition(WorkflowAction::Finalize, case)?;
            case.finalized_at = Some(Utc::now());
            Ok(())
        })
    }

    // ========================================================================
    // Patient Translation
    // ========================================================================

    /// Plain-language version of the finalized report, cached on the case.
    pub async fn translate_for_patient(
        &mut self,
        provider: &dyn LlmProvider,
    ) -> AppResult<PatientTranslation> {
        let case = self.require_case()?;
        self.actor().check(WorkflowAction::TranslateForPatient, case)?;
        if let Some(cached) = &case.patient_translation {
            return Ok(cached.clone());
        }

        let translation = translate_report(provider, &case.final_report_text).await?;
        let stored = translation.clone();
        self.mutate(move |case, _| {
            case.patient_translation = Some(stored);
            Ok(())
        })?;
        Ok(translation)
    }
}

impl std::fmt::Debug for CaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseSession")
            .field("case_id", &self.case().map(|c| c.id.as_str()))
            .field("persona", &self.acting_persona())
            .field("policy", &self.policy)
            .finish()
    }
}
