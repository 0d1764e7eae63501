use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use limitforge_engine::EngineError;
use limitforge_policy::PolicyError;

/// Errors the HTTP layer can surface to a caller (spec.md §7). Each variant
/// maps to exactly one status code; rate-limit *decisions* are never errors
/// here, only the surrounding plumbing.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `X-API-Key` header absent (§7 `missing_api_key` → 401).
    #[error("missing API key")]
    MissingApiKey,

    /// `X-API-Key` header present but unknown or revoked (§7
    /// `invalid_api_key` → 403).
    #[error("invalid API key")]
    InvalidApiKey,

    /// `Authorization: Bearer` header absent on an admin route (§7
    /// `missing_admin_token` → 401).
    #[error("missing admin token")]
    MissingAdminToken,

    /// Admin bearer token did not match (§7 `invalid_admin_token` → 403).
    #[error("invalid admin token")]
    InvalidAdminToken,

    /// Resolver found no matching plan (§7 `plan_not_found` → 404).
    #[error("plan not found")]
    PlanNotFound,

    /// Policy or counter store failed or timed out (§7
    /// `upstream_unavailable` → 503; never silently allow).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Request body failed schema validation (§7 `invalid_request` → 400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::UpstreamUnavailable(msg) => Self::UpstreamUnavailable(msg),
        }
    }
}

impl From<PolicyError> for ServerError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::PlanNotFound => Self::PlanNotFound,
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "request failed");

        let status = match &self {
            Self::MissingApiKey | Self::MissingAdminToken => StatusCode::UNAUTHORIZED,
            Self::InvalidApiKey | Self::InvalidAdminToken => StatusCode::FORBIDDEN,
            Self::PlanNotFound => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
