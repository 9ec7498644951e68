//! Application Snapshot
//!
//! The whole application-visible state, saved and loaded as one opaque value.

use serde::{Deserialize, Serialize};

use scan_review_core::{CaseRecord, Persona};

/// Fixed namespace the snapshot is stored under
pub const STATE_NAMESPACE: &str = "scan_review_state_v2";

/// Everything persisted between runs: the single live case and who is acting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    #[serde(default)]
    pub case: Option<CaseRecord>,
    #[serde(default)]
    pub acting_persona: Persona,
}
