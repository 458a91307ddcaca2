//! Event types for the Folio event system
//!
//! Provides shared event definitions and the EventBus used to push consent
//! and tracking activity to live subscribers (banner UI over SSE, logging).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::consent::{ConsentState, EffectiveConsent};

/// Folio event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FolioEvent {
    /// Consent state changed through a visitor decision
    ///
    /// Triggers:
    /// - SSE: Banner UI re-renders category toggles
    /// - Gated features: re-check effective consent
    ConsentChanged {
        /// Raw state after the transition
        state: ConsentState,
        /// Derived consent after the transition
        effective: EffectiveConsent,
        /// Whether the new state reached the persistent store
        persisted: bool,
        /// When the transition completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Banner visibility signal changed
    ///
    /// Triggers:
    /// - SSE: Show or hide the consent banner
    BannerVisibilityChanged {
        show_banner: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A click was tracked under analytics consent
    InteractionTracked {
        element_identifier: String,
        element_type: String,
        position_x: f64,
        position_y: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FolioEvent {
    /// Event type name, also used as the SSE event name
    pub fn event_type(&self) -> &str {
        match self {
            FolioEvent::ConsentChanged { .. } => "ConsentChanged",
            FolioEvent::BannerVisibilityChanged { .. } => "BannerVisibilityChanged",
            FolioEvent::InteractionTracked { .. } => "InteractionTracked",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// # Capacity Recommendations
///
/// - Server: 256
/// - Testing: 10-100
///
/// # Examples
///
/// ```
/// use folio_common::events::{EventBus, FolioEvent};
///
/// let event_bus = EventBus::new(256);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(FolioEvent::BannerVisibilityChanged {
///     show_banner: true,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "BannerVisibilityChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FolioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<FolioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: FolioEvent,
    ) -> Result<usize, broadcast::error::SendError<FolioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FolioEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
