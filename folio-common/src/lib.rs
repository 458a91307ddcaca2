//! # Folio Common Library
//!
//! Shared code for the Folio site services including:
//! - Consent data model (categories, state, effective consent)
//! - Event types (FolioEvent enum) and the EventBus
//! - Configuration loading and root folder resolution
//! - Common error type

pub mod config;
pub mod consent;
pub mod error;
pub mod events;

pub use consent::{ConsentCategory, ConsentState};
pub use error::{Error, Result};
