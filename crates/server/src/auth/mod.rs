//! API-key and admin-bearer-token authentication (spec.md §6, §7).
//!
//! Trimmed relative to the teacher's `acteon-server::auth`: no role/grant
//! system, no JWT sessions, no hot-reloadable auth file — this service has
//! exactly two auth modes (§6 "Admin auth ... No role/grant system is
//! introduced — that is teacher machinery for a different, broader
//! product").

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use limitforge_core::{constant_time_eq, hash_api_key};

use crate::error::ServerError;
use crate::state::AppState;

/// The tenant resolved by [`require_api_key`], attached to the request
/// extensions for downstream handlers.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedTenant(pub Uuid);

/// Middleware enforcing `X-API-Key` on the data plane (§6, §7
/// `missing_api_key` / `invalid_api_key`).
pub async fn require_api_key(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let raw_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::MissingApiKey)?;

    let key_hash = hash_api_key(raw_key, &state.apikey_hash_salt);
    let api_key = state
        .policy
        .find_active_api_key_by_hash(&key_hash)
        .await?
        .ok_or(ServerError::InvalidApiKey)?;

    req.extensions_mut()
        .insert(AuthenticatedTenant(api_key.tenant_id));
    Ok(next.run(req).await)
}

/// Middleware enforcing `Authorization: Bearer <admin-token>` on the control
/// plane (§6, §7 `missing_admin_token` / `invalid_admin_token`).
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::MissingAdminToken)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ServerError::MissingAdminToken)?;

    if !constant_time_eq(token, &state.admin_bearer_token) {
        return Err(ServerError::InvalidAdminToken);
    }

    Ok(next.run(req).await)
}
