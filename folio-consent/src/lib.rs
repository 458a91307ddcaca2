//! # Folio Consent Service (folio-consent)
//!
//! Cookie consent and consent-gated interaction tracking for the portfolio
//! site.
//!
//! **Purpose:** Remember the visitor's consent decision across sessions,
//! drive the consent banner, and report clicks on interactive elements to
//! analytics only while analytics consent is granted.
//!
//! **Architecture:** A single `ConsentService` owns the consent state and
//! persists it through a `ConsentStore`. The `InteractionTracker` listens on
//! a `ClickStream` and hands attributed clicks to an `AnalyticsSink`. The
//! HTTP/SSE surface (axum) exposes both to the browser.

pub mod api;
pub mod consent;
pub mod sink;
pub mod store;
pub mod tracker;

pub use api::{create_router, AppState};
pub use consent::{ConsentService, LoadOutcome, Transition};
pub use sink::{AnalyticsSink, SinkError};
pub use store::{ConsentStore, FileStore, MemoryStore, StoreError};
pub use tracker::{InteractionTracker, TrackerHandle};
