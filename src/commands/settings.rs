//! Settings Commands
//!
//! Commands for reading and updating application settings and provider keys.

use scan_review_llm::ProviderType;

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Get current application settings
pub async fn get_settings(state: &AppState) -> AppResult<AppConfig> {
    state.get_config().await
}

/// Update application settings with a partial update
pub async fn update_settings(state: &AppState, update: SettingsUpdate) -> AppResult<AppConfig> {
    let config = state.update_config(update).await?;
    tracing::info!(provider = %config.provider, batch_size = config.batch_size, "settings updated");
    Ok(config)
}

/// Restore default settings
pub async fn reset_settings(state: &AppState) -> AppResult<AppConfig> {
    state.reset_config().await
}

/// Store an API key for a provider
pub async fn set_api_key(state: &AppState, provider: ProviderType, key: &str) -> AppResult<()> {
    state
        .with_credentials(|store| store.set_api_key(provider, key))
        .await
}

/// Remove the stored API key for a provider
pub async fn delete_api_key(state: &AppState, provider: ProviderType) -> AppResult<()> {
    state
        .with_credentials(|store| store.delete_api_key(provider))
        .await
}

/// Providers with a stored API key
pub async fn list_api_key_providers(state: &AppState) -> AppResult<Vec<String>> {
    state.with_credentials(|store| store.list_providers()).await
}
