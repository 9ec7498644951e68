//! State Store
//!
//! Opaque load/save of the whole application snapshot under a namespace.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::snapshot::AppSnapshot;
use crate::utils::error::{AppError, AppResult};

/// Persistence boundary for the application snapshot.
pub trait StateStore: Send + Sync {
    /// Load the snapshot saved under `namespace`, if any.
    fn load(&self, namespace: &str) -> AppResult<Option<AppSnapshot>>;

    /// Replace the snapshot saved under `namespace`.
    fn save(&self, namespace: &str, snapshot: &AppSnapshot) -> AppResult<()>;
}

/// In-process store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved namespaces
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, namespace: &str) -> AppResult<Option<AppSnapshot>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| AppError::internal(format!("State store lock poisoned: {}", e)))?;
        match entries.get(namespace) {
            Some(payload) => Ok(Some(serde_json::from_str(payload)?)),
            None => Ok(None),
        }
    }

    fn save(&self, namespace: &str, snapshot: &AppSnapshot) -> AppResult<()> {
        // Serialise so the memory store round-trips exactly like the database.
        let payload = serde_json::to_string(snapshot)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::internal(format!("State store lock poisoned: {}", e)))?;
        entries.insert(namespace.to_string(), payload);
        Ok(())
    }
}
