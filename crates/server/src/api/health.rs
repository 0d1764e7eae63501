//! `GET /v1/health` (spec.md §6 "HTTP data plane").

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::schemas::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok",
        version: state.version.to_string(),
    };
    (StatusCode::OK, Json(body))
}
