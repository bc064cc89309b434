use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::chat::{InboundEvent, OutboundResponse, UserId};
use crate::engine::SessionState;

use super::state::AppState;

/// Header carrying the shared transport secret.
const TOKEN_HEADER: &str = "x-transport-token";

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /health ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── POST /api/event ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub user_id: UserId,
    #[serde(flatten)]
    pub event: InboundEvent,
}

#[derive(Serialize)]
pub struct EventReply {
    pub state: SessionState,
    pub responses: Vec<OutboundResponse>,
}

pub async fn event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<EventRequest>,
) -> Result<Json<EventReply>, ApiError> {
    let presented = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(state.transport_token.as_str()) {
        warn!(user = request.user_id, "event with missing or invalid transport token");
        return Err(api_error(StatusCode::UNAUTHORIZED, "invalid transport token"));
    }

    let step = state.engine.handle_event(request.user_id, request.event).await;
    Ok(Json(EventReply {
        state: step.state,
        responses: step.responses,
    }))
}
