//! Application State
//!
//! Shared state for the command layer, containing all services.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockMappedWriteGuard, RwLockWriteGuard};

use scan_review_llm::{create_provider, LlmProvider};

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::services::analysis::SliceAnalysisScheduler;
use crate::services::workflow::CaseSession;
use crate::storage::{load_or_create_passphrase, ConfigService, CredentialStore, Database, StateStore};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::secret_key_path;

/// Application state shared by every command
pub struct AppState {
    /// SQLite database with connection pool
    database: Arc<RwLock<Option<Database>>>,
    /// Provider API keys
    credentials: Arc<RwLock<Option<CredentialStore>>>,
    /// Configuration service for app settings
    config: Arc<RwLock<Option<ConfigService>>>,
    /// The live case, opened on first use
    session: Arc<RwLock<Option<CaseSession>>>,
    /// Provider used instead of the configured one
    provider_override: Arc<RwLock<Option<Arc<dyn LlmProvider>>>>,
    /// Whether the state has been initialized
    initialized: Arc<RwLock<bool>>,
}

impl AppState {
    /// Create a new uninitialized app state
    pub fn new() -> Self {
        Self {
            database: Arc::new(RwLock::new(None)),
            credentials: Arc::new(RwLock::new(None)),
            config: Arc::new(RwLock::new(None)),
            session: Arc::new(RwLock::new(None)),
            provider_override: Arc::new(RwLock::new(None)),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Initialize all services under `~/.scan-review`
    pub async fn initialize(&self) -> AppResult<()> {
        if *self.initialized.read().await {
            return Ok(());
        }
        let database = Database::new()?;
        let config = ConfigService::new()?;
        let passphrase = load_or_create_passphrase(&secret_key_path()?)?;
        let credentials = CredentialStore::new(database.clone(), &passphrase);
        self.initialize_with(database, config, credentials).await
    }

    /// Initialize all services inside `dir` (`data.db`, `config.json` and `secret.key`)
    pub async fn initialize_in(&self, dir: &Path) -> AppResult<()> {
        let database = Database::open(&dir.join("data.db"))?;
        let config = ConfigService::open(dir.join("config.json"))?;
        let passphrase = load_or_create_passphrase(&dir.join("secret.key"))?;
        let credentials = CredentialStore::new(database.clone(), &passphrase);
        self.initialize_with(database, config, credentials).await
    }

    /// Initialize from already constructed services
    pub async fn initialize_with(
        &self,
        database: Database,
        config: ConfigService,
        credentials: CredentialStore,
    ) -> AppResult<()> {
        let mut initialized = self.initialized.write().await;
        if *initialized {
            return Ok(());
        }

        *self.database.write().await = Some(database);
        *self.config.write().await = Some(config);
        *self.credentials.write().await = Some(credentials);
        *self.session.write().await = None;

        *initialized = true;
        tracing::debug!("application state initialized");
        Ok(())
    }

    /// Check if database is healthy
    pub fn is_database_healthy(&self) -> bool {
        // Use try_read to avoid blocking
        if let Ok(guard) = self.database.try_read() {
            if let Some(ref db) = *guard {
                return db.is_healthy();
            }
        }
        false
    }

    /// Check if config is healthy
    pub fn is_config_healthy(&self) -> bool {
        if let Ok(guard) = self.config.try_read() {
            if let Some(ref config) = *guard {
                return config.is_healthy();
            }
        }
        false
    }

    /// Whether a key is available for the configured provider
    pub async fn has_credential(&self) -> bool {
        let Ok(config) = self.get_config().await else {
            return false;
        };
        self.with_credentials(|store| store.get_api_key(config.provider))
            .await
            .map(|key| key.is_some())
            .unwrap_or(false)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Get the current configuration
    pub async fn get_config(&self) -> AppResult<AppConfig> {
        let guard = self.config.read().await;
        match &*guard {
            Some(config) => Ok(config.get_config_clone()),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Update the configuration and carry policy changes into the open session
    pub async fn update_config(&self, update: SettingsUpdate) -> AppResult<AppConfig> {
        let updated = {
            let mut guard = self.config.write().await;
            match &mut *guard {
                Some(config) => config.update_config(update)?,
                None => return Err(AppError::config("Config service not initialized")),
            }
        };

        if let Some(session) = self.session.write().await.as_mut() {
            session.set_policy(updated.workflow_policy());
            session.set_exam_title(updated.exam_title.clone());
        }
        Ok(updated)
    }

    /// Restore default settings
    pub async fn reset_config(&self) -> AppResult<AppConfig> {
        let mut guard = self.config.write().await;
        match &mut *guard {
            Some(config) => {
                config.reset()?;
                Ok(config.get_config_clone())
            }
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    // ========================================================================
    // Services
    // ========================================================================

    /// Get credential store access
    pub async fn with_credentials<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&CredentialStore) -> AppResult<T>,
    {
        let guard = self.credentials.read().await;
        match &*guard {
            Some(store) => f(store),
            None => Err(AppError::config("Credential store not initialized")),
        }
    }

    /// Get database access for direct queries
    pub async fn with_database<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Database) -> AppResult<T>,
    {
        let guard = self.database.read().await;
        match &*guard {
            Some(db) => f(db),
            None => Err(AppError::database("Database not initialized")),
        }
    }

    /// Use `provider` for every inference call instead of building one from
    /// the configuration
    pub async fn set_provider(&self, provider: Arc<dyn LlmProvider>) {
        *self.provider_override.write().await = Some(provider);
    }

    /// The inference provider for the current configuration and credential
    pub async fn provider(&self) -> AppResult<Arc<dyn LlmProvider>> {
        if let Some(provider) = self.provider_override.read().await.as_ref() {
            return Ok(provider.clone());
        }
        let config = self.get_config().await?;
        let api_key = self
            .with_credentials(|store| store.get_api_key(config.provider))
            .await?;
        Ok(create_provider(config.provider_config(api_key))?)
    }

    /// A scheduler bound to the current provider and batch size
    pub async fn scheduler(&self) -> AppResult<SliceAnalysisScheduler> {
        let config = self.get_config().await?;
        let provider = self.provider().await?;
        Ok(SliceAnalysisScheduler::new(provider, config.analysis_config()))
    }

    /// Exclusive access to the case session, opening it on first use
    pub async fn session(&self) -> AppResult<RwLockMappedWriteGuard<'_, CaseSession>> {
        let mut guard = self.session.write().await;
        if guard.is_none() {
            let config = self.get_config().await?;
            let store = self
                .with_database(|db| Ok(Arc::new(db.clone()) as Arc<dyn StateStore>))
                .await?;
            *guard = Some(CaseSession::open(
                store,
                config.workflow_policy(),
                config.exam_title,
            )?);
        }
        RwLockWriteGuard::try_map(guard, Option::as_mut)
            .map_err(|_| AppError::internal("Case session not initialized"))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("initialized", &self.initialized)
            .finish()
    }
}
