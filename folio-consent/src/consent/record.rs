//! Persisted consent record
//!
//! The record is the JSON form of `ConsentState`. Decoding pins `necessary`
//! to `true` and defaults missing flags to `false`; anything that is not a
//! JSON object of booleans is malformed.

use folio_common::consent::ConsentState;
use tracing::{info, warn};

use crate::store::StoreError;

/// How the startup load was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No record stored yet
    Missing,
    /// A valid record was restored
    Restored,
    /// A record exists but could not be parsed
    Corrupt,
    /// The store itself could not be read
    Unreadable,
}

impl LoadOutcome {
    /// Whether the banner must be shown after this outcome
    pub fn show_banner(&self) -> bool {
        !matches!(self, LoadOutcome::Restored)
    }
}

pub fn decode_record(text: &str) -> Result<ConsentState, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_record(state: &ConsentState) -> Result<String, serde_json::Error> {
    serde_json::to_string(state)
}

/// Turn the result of a store read into the starting state
///
/// Only a successfully decoded record replaces the defaults; every other
/// outcome starts unresolved.
pub(crate) fn classify(read: Result<Option<String>, StoreError>) -> (ConsentState, LoadOutcome) {
    match read {
        Ok(None) => {
            info!("No stored consent record, visitor has not responded");
            (ConsentState::default(), LoadOutcome::Missing)
        }
        Ok(Some(text)) => match decode_record(&text) {
            Ok(state) => {
                info!(
                    "Restored consent: analytics={} marketing={} responded={}",
                    state.analytics(),
                    state.marketing(),
                    state.has_responded()
                );
                (state, LoadOutcome::Restored)
            }
            Err(e) => {
                warn!("Stored consent record is malformed ({}), asking again", e);
                (ConsentState::default(), LoadOutcome::Corrupt)
            }
        },
        Err(e) => {
            warn!("Could not read consent store ({}), asking again", e);
            (ConsentState::default(), LoadOutcome::Unreadable)
        }
    }
}
