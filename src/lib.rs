//! Scan Review - Backend Library
//!
//! AI-assisted review of multi-image medical scans. It includes:
//! - Workflow-facing commands over a shared application state
//! - Services: slice analysis and aggregation, the case review workflow,
//!   report formatting and patient translation
//! - Storage layer (SQLite, credentials, config)
//! - Data models and utilities

pub mod commands;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

// Re-export commonly used items from commands
pub use commands::{
    // Init commands
    init_app, get_version,
    // Health commands
    get_health,
    // Settings commands
    get_settings, update_settings, set_api_key,
    // Case commands
    start_case, update_intake, run_analysis, analyze_files, accept_finding, reject_finding,
    submit_for_review, submit_review, finalize, translate_for_patient,
};
// Re-export models (avoiding settings module conflict)
pub use models::response::*;
pub use models::settings::{AppConfig, SettingsUpdate};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
