//! Consent state machine
//!
//! Owns the single process-wide `ConsentState`, restores it from the
//! persistent store at startup and persists it on every visitor decision.

mod record;
mod service;

pub use record::{decode_record, encode_record, LoadOutcome};
pub use service::{ConsentService, Transition};

pub use folio_common::consent::{ConsentCategory, ConsentState, EffectiveConsent};
