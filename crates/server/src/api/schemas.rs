//! Request/response payload shapes for the HTTP data and control planes
//! (spec.md §6, original_source `app/rl/schemas.py`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use limitforge_core::{Algorithm, SubjectType};

fn default_cost() -> i64 {
    1
}

/// `POST /v1/check` request body.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub resource: String,
    pub subject: String,
    #[serde(default = "default_cost")]
    pub cost: i64,
    pub plan_id: Option<Uuid>,
}

/// `POST /v1/admin/tenants` request body.
#[derive(Debug, Deserialize)]
pub struct TenantCreateRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// `POST /v1/admin/plans` request body.
#[derive(Debug, Deserialize)]
pub struct PlanCreateRequest {
    pub tenant_id: Uuid,
    pub name: String,
    pub algorithm: Algorithm,
    pub limit_per_window: Option<i64>,
    pub window_seconds: Option<i64>,
    pub bucket_capacity: Option<i64>,
    pub refill_rate_per_sec: Option<f64>,
    pub concurrency_limit: Option<i64>,
    #[serde(default = "default_cost")]
    pub cost_per_call: i64,
    #[serde(default = "default_burst_factor")]
    pub burst_factor: f64,
}

fn default_burst_factor() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub algorithm: Algorithm,
    pub limit_per_window: Option<i64>,
    pub window_seconds: Option<i64>,
    pub bucket_capacity: Option<i64>,
    pub refill_rate_per_sec: Option<f64>,
    pub concurrency_limit: Option<i64>,
    pub cost_per_call: i64,
    pub burst_factor: f64,
    pub created_at: DateTime<Utc>,
}

/// `POST /v1/admin/keys` request body.
#[derive(Debug, Deserialize)]
pub struct ApiKeyCreateRequest {
    pub tenant_id: Uuid,
    pub name: String,
}

/// `POST /v1/admin/keys` response — carries the raw key exactly once; it is
/// never persisted in cleartext (§6 "Admin CRUD payload shapes").
#[derive(Debug, Serialize)]
pub struct ApiKeyCreateResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub raw_key: String,
}

/// `POST /v1/admin/policies` request body.
#[derive(Debug, Deserialize)]
pub struct ResourcePolicyCreateRequest {
    pub tenant_id: Uuid,
    pub resource: String,
    pub subject_type: SubjectType,
    pub plan_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ResourcePolicyResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub resource: String,
    pub subject_type: SubjectType,
    pub plan_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// `GET /v1/admin/tenants/{id}/summary` response.
#[derive(Debug, Serialize)]
pub struct TenantSummaryResponse {
    pub tenant: TenantResponse,
    pub plan_count: i64,
    pub policy_count: i64,
    pub api_key_count: i64,
}

/// `GET /v1/health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
}
