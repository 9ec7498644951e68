//! Data Models
//!
//! Contains the data structures used at the application layer.

pub mod image;
pub mod response;
pub mod settings;
pub mod snapshot;

pub use self::image::*;
pub use response::*;
pub use settings::*;
pub use snapshot::*;
