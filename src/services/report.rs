//! Report Formatting
//!
//! The structured report template and the lines appended to it when a
//! finding is accepted.

use scan_review_core::{CanonicalFinding, CaseRecord};

use crate::services::analysis::prompt::NO_CONTEXT;

/// Sequence suffix of the case id printed in the header.
const CASE_SEQUENCE: &str = "001";

/// Report skeleton for a case that has no report text yet.
pub fn report_template(exam_title: &str, case: &CaseRecord) -> String {
    let patient_ref = if case.patient_ref.trim().is_empty() {
        "UNKNOWN"
    } else {
        case.patient_ref.trim()
    };
    let case_id = if patient_ref == "UNKNOWN" {
        patient_ref.to_string()
    } else {
        format!("{}-{}", patient_ref, CASE_SEQUENCE)
    };
    let context = case.clinical_context.trim();
    let indication = if context.is_empty() || context == NO_CONTEXT {
        "Clinical History not provided"
    } else {
        context
    };

    format!(
        "EXAM: {}\nCASE ID: {}\nREF: {}\nCLINICAL INDICATION: {}\n\nFINDINGS:\n",
        exam_title, case_id, patient_ref, indication
    )
}

/// Seed the report from the template if it is still empty.
pub fn ensure_report(exam_title: &str, case: &mut CaseRecord) {
    if case.final_report_text.trim().is_empty() {
        case.final_report_text = report_template(exam_title, case);
    }
}

/// Append an accepted finding as its own line.
pub fn append_finding(report: &mut String, finding: &CanonicalFinding) {
    if !report.is_empty() && !report.ends_with('\n') {
        report.push('\n');
    }
    report.push_str(&finding.report_line());
    report.push('\n');
}
