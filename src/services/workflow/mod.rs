//! Case Review Workflow
//!
//! Draft → PendingReview → Reviewed → Finalized, the personas allowed to
//! drive each step, and the session object that applies them to the live case.

pub mod machine;
pub mod session;

pub use machine::{
    can_edit_report, can_edit_reviewer_notes, can_view_report, can_view_reviewer_notes,
    GuardViolation, WorkflowAction, WorkflowPolicy,
};
pub use session::{generate_patient_ref, CaseSession};
