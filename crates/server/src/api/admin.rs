//! Admin CRUD handlers (spec.md §6 "HTTP control plane"): tenants, plans,
//! API keys, resource policies, and the per-tenant summary. These are
//! external collaborators of the core decision engine — thin wrappers over
//! [`limitforge_policy::PolicyStore`] that validate payload shape and defer
//! every invariant check to [`limitforge_core::Plan::validate`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use limitforge_core::{ApiKey, Plan, ResourcePolicy, Tenant};
use limitforge_policy::{NewPlan, NewResourcePolicy};

use super::schemas::{
    ApiKeyCreateRequest, ApiKeyCreateResponse, PlanCreateRequest, PlanResponse,
    ResourcePolicyCreateRequest, ResourcePolicyResponse, TenantCreateRequest, TenantResponse,
    TenantSummaryResponse,
};
use crate::error::ServerError;
use crate::state::AppState;

fn tenant_response(tenant: Tenant) -> TenantResponse {
    TenantResponse {
        id: tenant.id,
        name: tenant.name,
        created_at: tenant.created_at,
    }
}

fn plan_response(plan: Plan) -> PlanResponse {
    PlanResponse {
        id: plan.id,
        tenant_id: plan.tenant_id,
        name: plan.name,
        algorithm: plan.algorithm,
        limit_per_window: plan.limit_per_window,
        window_seconds: plan.window_seconds,
        bucket_capacity: plan.bucket_capacity,
        refill_rate_per_sec: plan.refill_rate_per_sec,
        concurrency_limit: plan.concurrency_limit,
        cost_per_call: plan.cost_per_call,
        burst_factor: plan.burst_factor,
        created_at: plan.created_at,
    }
}

fn resource_policy_response(policy: ResourcePolicy) -> ResourcePolicyResponse {
    ResourcePolicyResponse {
        id: policy.id,
        tenant_id: policy.tenant_id,
        resource: policy.resource,
        subject_type: policy.subject_type,
        plan_id: policy.plan_id,
        created_at: policy.created_at,
    }
}

/// `POST /v1/admin/tenants`.
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(request): Json<TenantCreateRequest>,
) -> Result<(StatusCode, Json<TenantResponse>), ServerError> {
    if request.name.trim().is_empty() {
        return Err(ServerError::InvalidRequest("name must be non-empty".into()));
    }
    let tenant = state.policy.create_tenant(&request.name).await?;
    Ok((StatusCode::CREATED, Json(tenant_response(tenant))))
}

/// `POST /v1/admin/plans`. Validates algorithm-parameter invariants (§3)
/// before persisting; the engine itself never rejects a stored plan, so
/// this is the only gate.
pub async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<PlanCreateRequest>,
) -> Result<(StatusCode, Json<PlanResponse>), ServerError> {
    let candidate = Plan {
        id: Uuid::nil(),
        tenant_id: request.tenant_id,
        name: request.name.clone(),
        algorithm: request.algorithm,
        limit_per_window: request.limit_per_window,
        window_seconds: request.window_seconds,
        bucket_capacity: request.bucket_capacity,
        refill_rate_per_sec: request.refill_rate_per_sec,
        concurrency_limit: request.concurrency_limit,
        cost_per_call: request.cost_per_call,
        burst_factor: request.burst_factor,
        created_at: chrono::Utc::now(),
    };
    candidate
        .validate()
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

    let new_plan = NewPlan {
        tenant_id: request.tenant_id,
        name: request.name,
        algorithm: request.algorithm,
        limit_per_window: request.limit_per_window,
        window_seconds: request.window_seconds,
        bucket_capacity: request.bucket_capacity,
        refill_rate_per_sec: request.refill_rate_per_sec,
        concurrency_limit: request.concurrency_limit,
        cost_per_call: request.cost_per_call,
        burst_factor: request.burst_factor,
    };
    let plan = state.policy.create_plan(new_plan).await?;
    Ok((StatusCode::CREATED, Json(plan_response(plan))))
}

/// `POST /v1/admin/keys`. Generates a CSPRNG raw key, hashes it per the
/// §6 API-key hashing contract, and returns the raw value exactly once —
/// it is never persisted in cleartext.
pub async fn create_api_key(
    State(state): State<AppState>,
    Json(request): Json<ApiKeyCreateRequest>,
) -> Result<(StatusCode, Json<ApiKeyCreateResponse>), ServerError> {
    if request.name.trim().is_empty() {
        return Err(ServerError::InvalidRequest("name must be non-empty".into()));
    }

    let raw_key: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();
    let raw_key = format!("lfk_{raw_key}");

    let key_hash = limitforge_core::hash_api_key(&raw_key, &state.apikey_hash_salt);
    let created: ApiKey = state
        .policy
        .create_api_key(request.tenant_id, &request.name, &key_hash)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreateResponse {
            id: created.id,
            tenant_id: created.tenant_id,
            name: created.name,
            raw_key,
        }),
    ))
}

/// `POST /v1/admin/policies`.
pub async fn create_resource_policy(
    State(state): State<AppState>,
    Json(request): Json<ResourcePolicyCreateRequest>,
) -> Result<(StatusCode, Json<ResourcePolicyResponse>), ServerError> {
    if request.resource.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "resource must be non-empty".into(),
        ));
    }
    let new_policy = NewResourcePolicy {
        tenant_id: request.tenant_id,
        resource: request.resource,
        subject_type: request.subject_type,
        plan_id: request.plan_id,
    };
    let policy = state.policy.create_resource_policy(new_policy).await?;
    Ok((
        StatusCode::CREATED,
        Json(resource_policy_response(policy)),
    ))
}

/// `GET /v1/admin/tenants/{id}/summary`.
pub async fn tenant_summary(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantSummaryResponse>, ServerError> {
    let summary = state
        .policy
        .tenant_summary(tenant_id)
        .await?
        .ok_or(ServerError::InvalidRequest("tenant not found".into()))?;

    Ok(Json(TenantSummaryResponse {
        tenant: tenant_response(summary.tenant),
        plan_count: summary.plan_count,
        policy_count: summary.policy_count,
        api_key_count: summary.api_key_count,
    }))
}
