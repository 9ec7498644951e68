//! Services
//!
//! Business logic services for the application.
//! Services handle the core functionality and are called by commands.

pub mod analysis;
pub mod report;
pub mod translation;
pub mod workflow;

pub use analysis::{AnalysisProgress, SliceAnalysisScheduler};
pub use workflow::{CaseSession, WorkflowAction, WorkflowPolicy};
