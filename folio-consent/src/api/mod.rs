//! HTTP API for the consent service

pub mod consent;
pub mod error;
pub mod health;
pub mod interactions;
pub mod sse;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use folio_common::events::EventBus;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::consent::ConsentService;
use crate::tracker::ClickStream;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub consent: Arc<ConsentService>,
    /// Click stream the interaction tracker listens on
    pub clicks: ClickStream,
    pub events: EventBus,
}

/// Run store-touching work off the async workers
///
/// Consent transitions write to the store synchronously; a slow disk must
/// not stall the runtime threads serving other requests.
pub(crate) async fn run_blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Background task failed: {}", e)))
}

/// Create the API router
///
/// With `allowed_origin` set, cross-origin requests are accepted from that
/// origin only; otherwise no CORS headers are added.
pub fn create_router(state: AppState, allowed_origin: Option<&str>) -> Router {
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/api/consent", get(consent::get_consent))
        .route("/api/consent/accept-all", post(consent::accept_all))
        .route("/api/consent/accept-necessary", post(consent::accept_necessary))
        .route("/api/consent/banner", put(consent::set_banner))
        .route(
            "/api/consent/:category",
            get(consent::get_category).put(consent::update_category),
        )
        .route("/api/interactions", post(interactions::report_click))
        .route("/api/events", get(sse::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Some(Err(e)) => {
            warn!("Ignoring invalid allowed_origin: {}", e);
            router
        }
        None => router,
    }
}
