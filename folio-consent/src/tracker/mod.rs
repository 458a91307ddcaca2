//! Interaction tracker
//!
//! Watches every click on the page and, while analytics consent is granted,
//! reports the clicked interactive element to an analytics sink.
//!
//! The pieces are kept separate so the attribution logic can be tested
//! without a live page:
//! - `dom`: element tree model
//! - `clicks`: click stream with cancellable subscriptions
//! - `detect`: pure click → `TrackedInteraction` attribution
//! - `InteractionTracker`: consent gate + delivery, attached to a stream

pub mod clicks;
pub mod detect;
pub mod dom;

pub use clicks::{ClickEvent, ClickStream, DispatchOutcome, ListenerOptions, Subscription};
pub use detect::{detect, TrackedInteraction};
pub use dom::{Document, ElementDescriptor, NodeId};

use std::sync::Arc;

use folio_common::ConsentCategory;
use tracing::{trace, warn};

use crate::consent::ConsentService;
use crate::sink::AnalyticsSink;

/// Keeps the tracker's click listener registered; drop to detach
pub struct TrackerHandle {
    _subscription: Subscription,
}

impl TrackerHandle {
    pub fn detach(self) {}
}

pub struct InteractionTracker {
    consent: Arc<ConsentService>,
    sink: Arc<dyn AnalyticsSink>,
}

impl InteractionTracker {
    pub fn new(consent: Arc<ConsentService>, sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { consent, sink }
    }

    /// Register one passive click listener on `stream`
    pub fn attach(
        stream: &ClickStream,
        consent: Arc<ConsentService>,
        sink: Arc<dyn AnalyticsSink>,
    ) -> TrackerHandle {
        let tracker = Self::new(consent, sink);
        let subscription = stream.subscribe(ListenerOptions::passive(), move |event| {
            tracker.handle_click(event);
        });
        TrackerHandle {
            _subscription: subscription,
        }
    }

    /// Handle one click; returns what was delivered to the sink
    pub fn handle_click(&self, event: &ClickEvent<'_>) -> Option<TrackedInteraction> {
        // Consent first: nothing else runs without it
        if !self.consent.has_consent(ConsentCategory::Analytics) {
            return None;
        }

        let Some(interaction) = detect(event) else {
            trace!("Click without interactive element ignored");
            return None;
        };

        if let Err(e) = self.sink.track(&interaction) {
            warn!(
                "Analytics sink dropped interaction '{}': {}",
                interaction.element_identifier, e
            );
        }
        Some(interaction)
    }
}
