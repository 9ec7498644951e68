//! Scan Review Core
//!
//! Foundational domain types for the Scan Review workspace. This crate has zero
//! dependencies on application-level code (storage, HTTP, inference providers).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `confidence` - The `Low < Medium < High` confidence ordering
//! - `finding` - Per-image raw findings and merged canonical findings
//! - `case` - The case record, workflow status, personas and analysis metadata
//! - `proxy` - Proxy configuration data types shared with the LLM crate
//!
//! ## Design Principles
//!
//! 1. **Only serde/thiserror/chrono** - keeps build times minimal
//! 2. **Plain data** - behaviour that needs I/O lives in the application crate
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod case;
pub mod confidence;
pub mod error;
pub mod finding;
pub mod proxy;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Confidence ─────────────────────────────────────────────────────────
pub use confidence::Confidence;

// ── Findings ───────────────────────────────────────────────────────────
pub use finding::{CanonicalFinding, Coordinates, RawFinding, ReviewStatus};

// ── Case Record ────────────────────────────────────────────────────────
pub use case::{
    AnalysisMetadata, CaseRecord, CaseStatus, ImageRef, PatientResource, PatientTranslation,
    Persona,
};

// ── Proxy Types ────────────────────────────────────────────────────────
pub use proxy::{ProxyConfig, ProxyProtocol};
