//! Health Check Commands
//!
//! Commands for checking the health status of backend services.

use crate::models::response::HealthResponse;
use crate::state::AppState;

/// Get the health status of all backend services
pub async fn get_health(state: &AppState) -> HealthResponse {
    let mut health = HealthResponse::default();

    health.database = state.is_database_healthy();
    health.config = state.is_config_healthy();
    // A missing key only blocks inference, so it does not degrade the status
    health.credential = state.has_credential().await;

    health.status = if health.database && health.config {
        "healthy".to_string()
    } else {
        "degraded".to_string()
    };

    health
}
