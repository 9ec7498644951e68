//! Initialization Commands
//!
//! Commands for application initialization and setup.

use crate::models::response::CommandResponse;
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Initialize all backend services
pub async fn init_app(state: &AppState) -> AppResult<String> {
    state.initialize().await?;
    let persona = state.session().await?.acting_persona();
    tracing::info!(persona = %persona, "application initialized");
    Ok("Application initialized successfully".to_string())
}

/// Get the application version
pub fn get_version() -> CommandResponse<String> {
    CommandResponse::ok(env!("CARGO_PKG_VERSION").to_string())
}
