//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! Everything lives under `~/.scan-review/` unless `SCAN_REVIEW_HOME` is set.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Environment variable overriding the application directory
pub const HOME_OVERRIDE_ENV: &str = "SCAN_REVIEW_HOME";

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Scan Review directory (~/.scan-review/)
pub fn scan_review_dir() -> AppResult<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_OVERRIDE_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    Ok(home_dir()?.join(".scan-review"))
}

/// Get the config file path (~/.scan-review/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(scan_review_dir()?.join("config.json"))
}

/// Get the database file path (~/.scan-review/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(scan_review_dir()?.join("data.db"))
}

/// Get the local secret file path (~/.scan-review/secret.key)
pub fn secret_key_path() -> AppResult<PathBuf> {
    Ok(scan_review_dir()?.join("secret.key"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Scan Review directory, creating if it doesn't exist
pub fn ensure_scan_review_dir() -> AppResult<PathBuf> {
    let path = scan_review_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
