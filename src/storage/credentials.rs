//! Credential Storage
//!
//! API keys per inference provider, kept encrypted in the SQLite `settings`
//! table with an environment fallback.

use std::sync::Arc;

use scan_review_llm::ProviderType;

use crate::storage::database::Database;
use crate::storage::secret::{decrypt_secret, encrypt_secret};
use crate::utils::error::{AppError, AppResult};

/// Settings key prefix for stored API keys
const KEY_PREFIX: &str = "api_key.";

/// Checked before the provider-specific variable
pub const GENERIC_KEY_ENV: &str = "SCAN_REVIEW_API_KEY";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Where a resolved key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Stored,
    Environment,
}

/// Credential store for inference providers
#[derive(Clone)]
pub struct CredentialStore {
    database: Database,
    passphrase: Arc<str>,
    env: EnvLookup,
}

fn settings_key(provider: ProviderType) -> String {
    format!("{}{}", KEY_PREFIX, provider)
}

/// Provider-specific environment variable
pub fn provider_env_var(provider: ProviderType) -> &'static str {
    match provider {
        ProviderType::Gemini => "GEMINI_API_KEY",
        ProviderType::OpenAI => "OPENAI_API_KEY",
    }
}

impl CredentialStore {
    /// Create a credential store reading fallbacks from the process environment.
    /// Stored keys are encrypted with a key derived from `passphrase`.
    pub fn new(database: Database, passphrase: &str) -> Self {
        Self::with_env(database, passphrase, |name| std::env::var(name).ok())
    }

    /// Create a credential store with a custom environment lookup
    pub fn with_env<F>(database: Database, passphrase: &str, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            database,
            passphrase: Arc::from(passphrase),
            env: Arc::new(env),
        }
    }

    /// Store an API key for a provider
    pub fn set_api_key(&self, provider: ProviderType, key: &str) -> AppResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::validation("API key cannot be empty"));
        }
        let encrypted = encrypt_secret(key, &self.passphrase)?;
        self.database.set_setting(&settings_key(provider), &encrypted)?;
        tracing::info!(provider = %provider, "API key stored");
        Ok(())
    }

    /// Delete the stored API key for a provider
    pub fn delete_api_key(&self, provider: ProviderType) -> AppResult<()> {
        self.database.delete_setting(&settings_key(provider))
    }

    /// Resolve the API key for a provider: stored key first, then environment.
    pub fn resolve(&self, provider: ProviderType) -> AppResult<Option<(String, CredentialSource)>> {
        if let Some(stored) = self.database.get_setting(&settings_key(provider))? {
            if !stored.trim().is_empty() {
                let key = decrypt_secret(&stored, &self.passphrase)?;
                return Ok(Some((key, CredentialSource::Stored)));
            }
        }

        let from_env = [GENERIC_KEY_ENV, provider_env_var(provider)]
            .into_iter()
            .filter_map(|name| (self.env)(name))
            .find(|value| !value.trim().is_empty());

        Ok(from_env.map(|value| (value, CredentialSource::Environment)))
    }

    /// Retrieve the API key for a provider, if any
    pub fn get_api_key(&self, provider: ProviderType) -> AppResult<Option<String>> {
        Ok(self.resolve(provider)?.map(|(key, _)| key))
    }

    /// Providers with a stored key
    pub fn list_providers(&self) -> AppResult<Vec<String>> {
        Ok(self
            .database
            .get_settings_by_prefix(KEY_PREFIX)?
            .into_iter()
            .map(|(key, _)| key.trim_start_matches(KEY_PREFIX).to_string())
            .collect())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
