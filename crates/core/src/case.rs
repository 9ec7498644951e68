//! Case Record
//!
//! The single live case, its workflow status, the personas that act on it and
//! the metadata produced by an analysis run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::finding::CanonicalFinding;

/// Workflow status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Draft,
    PendingReview,
    Reviewed,
    Finalized,
}

impl CaseStatus {
    /// No transition leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Finalized)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Draft => write!(f, "draft"),
            CaseStatus::PendingReview => write!(f, "pending_review"),
            CaseStatus::Reviewed => write!(f, "reviewed"),
            CaseStatus::Finalized => write!(f, "finalized"),
        }
    }
}

impl FromStr for CaseStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(CaseStatus::Draft),
            "pending_review" => Ok(CaseStatus::PendingReview),
            "reviewed" => Ok(CaseStatus::Reviewed),
            "finalized" => Ok(CaseStatus::Finalized),
            other => Err(CoreError::parse(format!("unknown case status: {}", other))),
        }
    }
}

/// Actor role with distinct permissions on the case record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Primary reviewer who owns the report.
    #[default]
    Primary,
    /// Peer reviewer giving a second opinion.
    Peer,
    /// Read-only patient view.
    Patient,
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persona::Primary => write!(f, "primary"),
            Persona::Peer => write!(f, "peer"),
            Persona::Patient => write!(f, "patient"),
        }
    }
}

impl FromStr for Persona {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(Persona::Primary),
            "peer" => Ok(Persona::Peer),
            "patient" => Ok(Persona::Patient),
            other => Err(CoreError::parse(format!("unknown persona: {}", other))),
        }
    }
}

/// Outcome of modality validation for an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// True iff at least one image was judged the expected scan type.
    pub is_valid_modality: bool,
    pub modality_description: String,
    pub generated_at: DateTime<Utc>,
}

/// An analysed image, in upload order. Image bytes are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub id: String,
    pub label: String,
    pub mime_type: String,
}

/// A further-reading pointer in a patient translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientResource {
    pub title: String,
    pub source: String,
}

/// Plain-language rendering of a finalized report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientTranslation {
    pub summary: String,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<PatientResource>,
}

/// The root entity. Exactly one live instance exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    pub patient_ref: String,
    pub clinical_context: String,
    pub created_at: DateTime<Utc>,
    pub status: CaseStatus,
    /// Note attached by the primary reviewer when requesting review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_request_note: Option<String>,
    /// Notes returned by the peer reviewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_reviewer: Option<String>,
    #[serde(default)]
    pub final_report_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_metadata: Option<AnalysisMetadata>,
    #[serde(default)]
    pub findings: Vec<CanonicalFinding>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_translation: Option<PatientTranslation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl CaseRecord {
    /// Create a fresh draft case.
    pub fn new(id: impl Into<String>, patient_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            patient_ref: patient_ref.into(),
            clinical_context: String::new(),
            created_at: Utc::now(),
            status: CaseStatus::Draft,
            review_request_note: None,
            reviewer_note: None,
            assigned_reviewer: None,
            final_report_text: String::new(),
            analysis_metadata: None,
            findings: Vec::new(),
            images: Vec::new(),
            patient_translation: None,
            finalized_at: None,
        }
    }

    /// Look up a finding by id.
    pub fn finding(&self, finding_id: &str) -> Option<&CanonicalFinding> {
        self.findings.iter().find(|f| f.id == finding_id)
    }

    /// Look up a finding by id for mutation.
    pub fn finding_mut(&mut self, finding_id: &str) -> Option<&mut CanonicalFinding> {
        self.findings.iter_mut().find(|f| f.id == finding_id)
    }

    /// Look up an analysed image by id.
    pub fn image(&self, image_id: &str) -> Option<&ImageRef> {
        self.images.iter().find(|i| i.id == image_id)
    }

    /// Field-level clear of everything an analysis run produced.
    pub fn clear_analysis(&mut self) {
        self.analysis_metadata = None;
        self.findings.clear();
        self.images.clear();
    }

    /// Whether an analysis has completed for the current image set.
    pub fn has_analysis(&self) -> bool {
        self.analysis_metadata.is_some()
    }
}
