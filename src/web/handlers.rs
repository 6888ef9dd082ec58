//! HTTP request handlers.

use super::AppState;
use crate::measurement::{MeasurementRequest, ProbeMessage, RequestContext, UserTier};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

pub const TIER_HEADER: &str = "x-vantage-tier";
pub const USER_HEADER: &str = "x-vantage-user";

/// Caller identity as stamped by the fronting auth proxy.
fn request_context(headers: &HeaderMap) -> RequestContext {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    RequestContext {
        tier: value(TIER_HEADER).and_then(|t| UserTier::from_name(&t)),
        user_id: value(USER_HEADER),
    }
}

// ============================================================================
// API: Measurements
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeasurementResponse {
    pub id: String,
    pub probes_count: usize,
}

pub async fn handle_create_measurement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MeasurementRequest>,
) -> impl IntoResponse {
    let matched = match state.router.find_matching_probes(request).await {
        Ok(m) => m,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    if matched.selected_probes.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "No suitable probes found").into_response();
    }

    let ctx = request_context(&headers);
    match state
        .store
        .create_measurement(&matched.request, &matched.selected_probes, &ctx)
        .await
    {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(CreateMeasurementResponse {
                id,
                probes_count: matched.selected_probes.len(),
            }),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_measurement(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_measurement_string(&id).await {
        Ok(Some(raw)) => ([(header::CONTENT_TYPE, "application/json")], raw).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Measurement not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Probe messages
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProbeMessageBody {
    pub probe: String,
    #[serde(flatten)]
    pub message: ProbeMessage,
}

pub async fn handle_probe_message(State(state): State<AppState>, Json(body): Json<ProbeMessageBody>) -> impl IntoResponse {
    if state.dispatcher.dispatch(body.probe, body.message).await {
        StatusCode::ACCEPTED.into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Dispatcher unavailable").into_response()
    }
}
