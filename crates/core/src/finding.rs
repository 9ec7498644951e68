//! Finding Types
//!
//! `RawFinding` is what a single inference call reports for one image.
//! `CanonicalFinding` is the deduplicated observation merged across images.

use serde::{Deserialize, Serialize};

use crate::confidence::Confidence;

/// A finding reported for one image. Ephemeral: consumed by aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
    pub title: String,
    pub description: String,
    pub confidence: Confidence,
    pub region: String,
    pub source_image_id: String,
}

impl RawFinding {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        confidence: Confidence,
        region: impl Into<String>,
        source_image_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            confidence,
            region: region.into(),
            source_image_id: source_image_id.into(),
        }
    }
}

/// Image-space location of a finding, overlaid by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// Review state of a proposed finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// One finding per distinct (region, title) pair of an analysis run.
///
/// `best_image_id` is always a member of `source_image_ids`, and `likelihood`
/// is the highest confidence among the merged raw findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFinding {
    pub id: String,
    pub title: String,
    pub region: String,
    pub likelihood: Confidence,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub review_status: ReviewStatus,
    pub source_image_ids: Vec<String>,
    pub best_image_id: String,
}

impl CanonicalFinding {
    /// Whether the finding was seen on the given image.
    pub fn observed_in(&self, image_id: &str) -> bool {
        self.source_image_ids.iter().any(|id| id == image_id)
    }

    /// Line appended to the report when the finding is accepted.
    pub fn report_line(&self) -> String {
        format!(
            "- {}: {}. {} ({} confidence)",
            self.region, self.title, self.description, self.likelihood
        )
    }
}
