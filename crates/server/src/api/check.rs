use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::instrument;

use limitforge_core::SubjectType;
use limitforge_policy::PlanResolver;

use super::schemas::CheckRequest;
use crate::auth::AuthenticatedTenant;
use crate::error::ServerError;
use crate::state::AppState;

/// `POST /v1/check` (spec.md §6 "HTTP data plane").
///
/// The caller's identity comes from `X-API-Key` (verified by
/// [`crate::auth::require_api_key`]); the resource policy lookup always
/// resolves under [`SubjectType::ApiKey`] since the data plane has no other
/// authentication mode.
#[instrument(skip(state, request), fields(resource = %request.resource))]
pub async fn check(
    State(state): State<AppState>,
    Extension(AuthenticatedTenant(tenant_id)): Extension<AuthenticatedTenant>,
    Json(request): Json<CheckRequest>,
) -> Result<Response, ServerError> {
    if request.cost < 1 {
        return Err(ServerError::InvalidRequest("cost must be >= 1".into()));
    }
    if request.resource.is_empty() || request.subject.is_empty() {
        return Err(ServerError::InvalidRequest(
            "resource and subject must be non-empty".into(),
        ));
    }

    let resolver = PlanResolver::new(state.policy.as_ref());
    let plan = resolver
        .resolve(tenant_id, &request.resource, SubjectType::ApiKey, request.plan_id)
        .await?;

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_millis() as i64;

    let decision = state
        .engine
        .check(
            &tenant_id.to_string(),
            &request.subject,
            &request.resource,
            request.cost,
            &plan,
            now_ms,
        )
        .await?;

    let status = if decision.allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    let mut response = (status, Json(decision.clone())).into_response();
    let headers = response.headers_mut();
    for (name, value) in &decision.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    Ok(response)
}
