//! Consent service
//!
//! Single process-scoped owner of the consent state. Consumers (banner UI,
//! interaction tracker, gated features) receive an `Arc<ConsentService>` and
//! either query effective consent or call one of the transitions:
//!
//! - `accept_all`
//! - `accept_necessary_only`
//! - `update_consent(category, value)`
//! - `set_show_banner(show)` (banner visibility only)
//!
//! Every transition writes the new state to the store before it becomes the
//! in-memory state. The write runs outside the state lock, so queries such as
//! `has_consent` never wait on storage I/O. A failed write is logged and the
//! transition still takes effect for the rest of the session;
//! `Transition::persisted` reports which case happened.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use folio_common::events::{EventBus, FolioEvent};
use tracing::{debug, info, warn};

use super::record::{classify, encode_record, LoadOutcome};
use super::{ConsentCategory, ConsentState};
use crate::store::ConsentStore;

/// Result of a completed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the transition
    pub state: ConsentState,
    /// Whether the state reached the persistent store
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy)]
struct Current {
    state: ConsentState,
    show_banner: bool,
}

pub struct ConsentService {
    current: RwLock<Current>,
    /// Serializes transitions so the store write can run outside `current`
    transitions: Mutex<()>,
    store: Arc<dyn ConsentStore>,
    storage_key: String,
    events: Option<EventBus>,
}

impl ConsentService {
    /// Build the service from whatever the store holds under `storage_key`
    ///
    /// Runs the one-shot startup load. No retry: an unreadable or malformed
    /// record simply starts the visitor over at the unresolved default.
    pub fn load(store: Arc<dyn ConsentStore>, storage_key: impl Into<String>) -> (Self, LoadOutcome) {
        let storage_key = storage_key.into();
        let (state, outcome) = classify(store.read(&storage_key));

        info!(
            "Consent loaded from '{}': {:?}, banner {}",
            storage_key,
            outcome,
            if outcome.show_banner() { "shown" } else { "hidden" }
        );

        let service = Self {
            current: RwLock::new(Current {
                state,
                show_banner: outcome.show_banner(),
            }),
            transitions: Mutex::new(()),
            store,
            storage_key,
            events: None,
        };
        (service, outcome)
    }

    /// Publish transitions and banner changes on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Snapshot of the current raw state
    pub fn state(&self) -> ConsentState {
        self.read().state
    }

    /// Banner visibility signal
    pub fn show_banner(&self) -> bool {
        self.read().show_banner
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Effective consent for `category`; no side effects
    pub fn has_consent(&self, category: ConsentCategory) -> bool {
        self.read().state.has_consent(category)
    }

    /// Grant every category
    pub fn accept_all(&self) -> Transition {
        debug!("Visitor accepted all categories");
        self.transition(|_| ConsentState::accepted_all())
    }

    /// Grant only the necessary category
    pub fn accept_necessary_only(&self) -> Transition {
        debug!("Visitor accepted necessary only");
        self.transition(|_| ConsentState::necessary_only())
    }

    /// Set one optional category, leaving the other untouched
    ///
    /// Returns `None` (and changes nothing) for `Necessary`.
    pub fn update_consent(&self, category: ConsentCategory, value: bool) -> Option<Transition> {
        if !category.is_optional() {
            debug!("Ignoring attempt to set {} consent to {}", category, value);
            return None;
        }

        debug!("Visitor set {} consent to {}", category, value);
        Some(self.transition(|current| {
            current
                .with_category(category, value)
                .unwrap_or(*current)
        }))
    }

    /// Externally set the banner visibility (e.g. "manage preferences")
    pub fn set_show_banner(&self, show: bool) {
        let mut current = self.write();
        if current.show_banner != show {
            current.show_banner = show;
            // Published under the guard so event order matches commit order
            self.publish_banner(show);
        }
    }

    fn transition(&self, next: impl FnOnce(&ConsentState) -> ConsentState) -> Transition {
        // Transitions run one at a time; readers are only blocked for the commit
        let _serial = self
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let state = next(&self.read().state);
        let persisted = self.persist(&state);

        let mut current = self.write();
        let was_shown = current.show_banner;
        current.state = state;
        current.show_banner = false;

        if let Some(events) = &self.events {
            events.emit_lossy(FolioEvent::ConsentChanged {
                state,
                effective: state.effective(),
                persisted,
                timestamp: chrono::Utc::now(),
            });
        }
        if was_shown {
            self.publish_banner(false);
        }

        Transition { state, persisted }
    }

    fn persist(&self, state: &ConsentState) -> bool {
        let record = match encode_record(state) {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not encode consent record: {}", e);
                return false;
            }
        };

        match self.store.write(&self.storage_key, &record) {
            Ok(()) => true,
            Err(e) => {
                // Consent still applies for this session; it is lost on next start
                warn!(
                    "Could not persist consent under '{}': {}",
                    self.storage_key, e
                );
                false
            }
        }
    }

    fn publish_banner(&self, show_banner: bool) {
        if let Some(events) = &self.events {
            events.emit_lossy(FolioEvent::BannerVisibilityChanged {
                show_banner,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn read(&self) -> Current {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Current> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}
