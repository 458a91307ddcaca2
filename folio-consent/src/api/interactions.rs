//! Click beacon
//!
//! The page reports each click as the path from the clicked element up to
//! the root. The server rebuilds that path as an element tree and dispatches
//! the click on the process click stream, where the attached tracker
//! decides (under consent) whether anything is reported.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};
use super::{run_blocking, AppState};
use crate::tracker::{ClickEvent, Document, ElementDescriptor};

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    /// Clicked element first, then each ancestor
    pub path: Vec<ElementDescriptor>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    /// Listeners that received the click
    pub dispatched_to: usize,
}

/// POST /api/interactions
pub async fn report_click(
    State(state): State<AppState>,
    payload: Result<Json<InteractionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<InteractionResponse>)> {
    let Json(req) = payload?;
    let (document, target) = Document::from_path(&req.path)
        .ok_or_else(|| ApiError::BadRequest("Click path must not be empty".to_string()))?;

    // Listeners run synchronously and may call into sinks
    let outcome = run_blocking(move || {
        state
            .clicks
            .dispatch(&ClickEvent::new(&document, target, req.x, req.y))
    })
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(InteractionResponse {
            dispatched_to: outcome.listeners,
        }),
    ))
}
