//! Case Workflow State Machine
//!
//! Pure guard logic: which persona may move a case from which status, and
//! what each persona may read or edit in each status. Nothing here mutates a
//! case; `session` applies the results.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scan_review_core::{CaseStatus, Persona};

// ============================================================================
// Types
// ============================================================================

/// Something a persona attempts on the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    StartCase,
    SubmitForReview,
    SubmitReview,
    Finalize,
    EditIntake,
    RunAnalysis,
    ResetAnalysis,
    AcceptFinding,
    RejectFinding,
    EditReport,
    EditReviewerNotes,
    ViewReport,
    ViewReviewerNotes,
    TranslateForPatient,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAction::StartCase => "start a new case",
            WorkflowAction::SubmitForReview => "submit for review",
            WorkflowAction::SubmitReview => "submit a review",
            WorkflowAction::Finalize => "finalize",
            WorkflowAction::EditIntake => "edit intake",
            WorkflowAction::RunAnalysis => "run analysis",
            WorkflowAction::ResetAnalysis => "reset analysis",
            WorkflowAction::AcceptFinding => "accept a finding",
            WorkflowAction::RejectFinding => "reject a finding",
            WorkflowAction::EditReport => "edit the report",
            WorkflowAction::EditReviewerNotes => "edit reviewer notes",
            WorkflowAction::ViewReport => "view the report",
            WorkflowAction::ViewReviewerNotes => "view reviewer notes",
            WorkflowAction::TranslateForPatient => "translate for the patient",
        }
    }

    /// Actions that change the case status.
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            WorkflowAction::SubmitForReview | WorkflowAction::SubmitReview | WorkflowAction::Finalize
        )
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrong persona or wrong status for an action. Nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{persona} cannot {action} while the case is {status}")]
pub struct GuardViolation {
    pub action: WorkflowAction,
    pub persona: Persona,
    pub status: CaseStatus,
}

impl GuardViolation {
    pub fn new(action: WorkflowAction, persona: Persona, status: CaseStatus) -> Self {
        Self {
            action,
            persona,
            status,
        }
    }
}

/// Tunable strictness of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPolicy {
    /// When set, `Finalize` is only reachable from `Reviewed`.
    #[serde(default)]
    pub require_peer_review: bool,
}

// ============================================================================
// Transition Table
// ============================================================================

impl WorkflowPolicy {
    /// Statuses `Finalize` may start from.
    pub fn finalize_sources(&self) -> &'static [CaseStatus] {
        if self.require_peer_review {
            &[CaseStatus::Reviewed]
        } else {
            &[CaseStatus::Draft, CaseStatus::Reviewed]
        }
    }

    /// Validate a status transition and return the target status.
    pub fn transition(
        &self,
        action: WorkflowAction,
        persona: Persona,
        from: CaseStatus,
    ) -> Result<CaseStatus, GuardViolation> {
        let violation = || GuardViolation::new(action, persona, from);
        match action {
            WorkflowAction::SubmitForReview => {
                if persona == Persona::Primary && !from.is_terminal() {
                    Ok(CaseStatus::PendingReview)
                } else {
                    Err(violation())
                }
            }
            WorkflowAction::SubmitReview => {
                if persona == Persona::Peer && from == CaseStatus::PendingReview {
                    Ok(CaseStatus::Reviewed)
                } else {
                    Err(violation())
                }
            }
            WorkflowAction::Finalize => {
                if persona == Persona::Primary && self.finalize_sources().contains(&from) {
                    Ok(CaseStatus::Finalized)
                } else {
                    Err(violation())
                }
            }
            _ => Err(violation()),
        }
    }

    /// Validate any action. Transitions go through the transition table.
    pub fn check(
        &self,
        action: WorkflowAction,
        persona: Persona,
        status: CaseStatus,
    ) -> Result<(), GuardViolation> {
        let allowed = match action {
            WorkflowAction::SubmitForReview
            | WorkflowAction::SubmitReview
            | WorkflowAction::Finalize => {
                return self.transition(action, persona, status).map(|_| ());
            }
            WorkflowAction::StartCase => persona == Persona::Primary,
            WorkflowAction::EditIntake => persona == Persona::Primary && !status.is_terminal(),
            WorkflowAction::RunAnalysis
            | WorkflowAction::ResetAnalysis
            | WorkflowAction::AcceptFinding
            | WorkflowAction::RejectFinding
            | WorkflowAction::EditReport => can_edit_report(persona, status),
            WorkflowAction::EditReviewerNotes => can_edit_reviewer_notes(persona, status),
            WorkflowAction::ViewReport => can_view_report(persona, status),
            WorkflowAction::ViewReviewerNotes => can_view_reviewer_notes(persona, status),
            WorkflowAction::TranslateForPatient => status == CaseStatus::Finalized,
        };
        if allowed {
            Ok(())
        } else {
            Err(GuardViolation::new(action, persona, status))
        }
    }

    /// Every action the persona may take in this status.
    pub fn available_actions(&self, persona: Persona, status: CaseStatus) -> Vec<WorkflowAction> {
        ALL_ACTIONS
            .iter()
            .copied()
            .filter(|action| self.check(*action, persona, status).is_ok())
            .collect()
    }
}

const ALL_ACTIONS: [WorkflowAction; 14] = [
    WorkflowAction::StartCase,
    WorkflowAction::SubmitForReview,
    WorkflowAction::SubmitReview,
    WorkflowAction::Finalize,
    WorkflowAction::EditIntake,
    WorkflowAction::RunAnalysis,
    WorkflowAction::ResetAnalysis,
    WorkflowAction::AcceptFinding,
    WorkflowAction::RejectFinding,
    WorkflowAction::EditReport,
    WorkflowAction::EditReviewerNotes,
    WorkflowAction::ViewReport,
    WorkflowAction::ViewReviewerNotes,
    WorkflowAction::TranslateForPatient,
];

// ============================================================================
// Access Guards
// ============================================================================

/// Report text is writable by Primary outside peer review, until finalized.
pub fn can_edit_report(persona: Persona, status: CaseStatus) -> bool {
    persona == Persona::Primary
        && !matches!(status, CaseStatus::PendingReview | CaseStatus::Finalized)
}

/// Only the Peer writes reviewer notes, and only during peer review.
pub fn can_edit_reviewer_notes(persona: Persona, status: CaseStatus) -> bool {
    persona == Persona::Peer && status == CaseStatus::PendingReview
}

/// The patient sees the report once it is finalized.
pub fn can_view_report(persona: Persona, status: CaseStatus) -> bool {
    persona != Persona::Patient || status == CaseStatus::Finalized
}

pub fn can_view_reviewer_notes(persona: Persona, status: CaseStatus) -> bool {
    match status {
        CaseStatus::Draft => false,
        CaseStatus::PendingReview => persona == Persona::Peer,
        CaseStatus::Reviewed | CaseStatus::Finalized => true,
    }
}
