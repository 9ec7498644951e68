//! Storage Layer
//!
//! Handles all data persistence: SQLite database, encrypted credentials,
//! application snapshot, and JSON config.

pub mod config;
pub mod credentials;
pub mod database;
pub mod secret;
pub mod state_store;

pub use config::*;
pub use credentials::*;
pub use database::*;
pub use secret::*;
pub use state_store::*;
