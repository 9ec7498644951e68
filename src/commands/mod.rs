//! Commands
//!
//! The workflow-facing API. Each command takes the shared `AppState` and
//! returns the updated value or an `AppError`; wrap results in
//! `CommandResponse` for transport.

pub mod case;
pub mod health;
pub mod init;
pub mod settings;

pub use case::*;
pub use health::*;
pub use init::*;
pub use settings::*;
