//! Consent endpoints
//!
//! Thin JSON wrappers around `ConsentService`. Category names in paths are
//! parsed case-insensitively; an unknown name is a 404.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ApiError, ApiResult};
use super::{run_blocking, AppState};
use crate::consent::{ConsentCategory, ConsentState, EffectiveConsent, Transition};

#[derive(Debug, Serialize)]
pub struct ConsentResponse {
    pub state: ConsentState,
    pub show_banner: bool,
    pub effective: EffectiveConsent,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub category: ConsentCategory,
    pub granted: bool,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub state: ConsentState,
    pub persisted: bool,
    pub show_banner: bool,
    /// False when the request was a no-op (e.g. toggling `necessary`)
    pub applied: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConsentRequest {
    pub value: bool,
}

#[derive(Debug, Deserialize)]
pub struct BannerRequest {
    pub show: bool,
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub show_banner: bool,
}

fn parse_category(name: &str) -> ApiResult<ConsentCategory> {
    name.parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown consent category: {}", name)))
}

fn transition_response(state: &AppState, transition: Transition) -> TransitionResponse {
    TransitionResponse {
        state: transition.state,
        persisted: transition.persisted,
        show_banner: state.consent.show_banner(),
        applied: true,
    }
}

/// GET /api/consent
pub async fn get_consent(State(state): State<AppState>) -> Json<ConsentResponse> {
    let current = state.consent.state();
    Json(ConsentResponse {
        state: current,
        show_banner: state.consent.show_banner(),
        effective: current.effective(),
    })
}

/// GET /api/consent/:category
pub async fn get_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<CategoryResponse>> {
    let category = parse_category(&name)?;
    Ok(Json(CategoryResponse {
        category,
        granted: state.consent.has_consent(category),
    }))
}

/// POST /api/consent/accept-all
pub async fn accept_all(State(state): State<AppState>) -> ApiResult<Json<TransitionResponse>> {
    run_blocking(move || {
        let transition = state.consent.accept_all();
        Json(transition_response(&state, transition))
    })
    .await
}

/// POST /api/consent/accept-necessary
pub async fn accept_necessary(
    State(state): State<AppState>,
) -> ApiResult<Json<TransitionResponse>> {
    run_blocking(move || {
        let transition = state.consent.accept_necessary_only();
        Json(transition_response(&state, transition))
    })
    .await
}

/// PUT /api/consent/:category
pub async fn update_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<UpdateConsentRequest>, JsonRejection>,
) -> ApiResult<Json<TransitionResponse>> {
    let category = parse_category(&name)?;
    let Json(req) = payload?;

    run_blocking(move || match state.consent.update_consent(category, req.value) {
        Some(transition) => Json(transition_response(&state, transition)),
        None => {
            debug!("Ignored update of immutable category '{}'", category);
            Json(TransitionResponse {
                state: state.consent.state(),
                persisted: false,
                show_banner: state.consent.show_banner(),
                applied: false,
            })
        }
    })
    .await
}

/// PUT /api/consent/banner
pub async fn set_banner(
    State(state): State<AppState>,
    payload: Result<Json<BannerRequest>, JsonRejection>,
) -> ApiResult<Json<BannerResponse>> {
    let Json(req) = payload?;

    run_blocking(move || {
        state.consent.set_show_banner(req.show);
        Json(BannerResponse {
            show_banner: state.consent.show_banner(),
        })
    })
    .await
}
