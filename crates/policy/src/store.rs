use async_trait::async_trait;
use uuid::Uuid;

use limitforge_core::{Algorithm, ApiKey, Plan, ResourcePolicy, SubjectType, Tenant};

use crate::error::PolicyError;

/// Creation payload for a new [`Plan`] (admin `POST /v1/admin/plans`).
#[derive(Debug, Clone)]
pub struct NewPlan {
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
}

/// Creation payload for a new [`ResourcePolicy`] (admin `POST
/// /v1/admin/policies`).
#[derive(Debug, Clone)]
pub struct NewResourcePolicy {
    pub tenant_id: Uuid,
    pub resource: String,
    pub subject_type: SubjectType,
    pub plan_id: Uuid,
}

/// Aggregate view returned by `GET /v1/admin/tenants/{id}/summary`.
#[derive(Debug, Clone)]
pub struct TenantSummary {
    pub tenant: Tenant,
    pub plan_count: i64,
    pub policy_count: i64,
    pub api_key_count: i64,
}

/// Read-mostly persistence for tenants, plans, resource policies and API
/// keys (§3, §6 "Policy store"). Implementations must give the resolver a
/// consistent read of `(tenant, resource, subject_type) -> plan`; writes
/// come exclusively from admin operations (§5 "Shared-resource policy").
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Look up a plan by id, with no tenant filter (spec.md §4.3 step 1 and
    /// §9 open question #2: explicit `plan_id` resolution performs no
    /// ownership check — preserved deliberately).
    async fn get_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, PolicyError>;

    /// Resolve `(tenant_id, resource, subject_type)` to the most recently
    /// created matching plan (spec.md §4.3 step 2).
    async fn resolve_plan(
        &self,
        tenant_id: Uuid,
        resource: &str,
        subject_type: SubjectType,
    ) -> Result<Option<Plan>, PolicyError>;

    async fn create_tenant(&self, name: &str) -> Result<Tenant, PolicyError>;

    async fn create_plan(&self, new_plan: NewPlan) -> Result<Plan, PolicyError>;

    async fn create_resource_policy(
        &self,
        new_policy: NewResourcePolicy,
    ) -> Result<ResourcePolicy, PolicyError>;

    /// Persist a newly issued API key. `key_hash` is the already-hashed
    /// value (§6 "API-key hashing contract"); the raw key is never stored.
    async fn create_api_key(
        &self,
        tenant_id: Uuid,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, PolicyError>;

    /// Look up an active, non-revoked API key by its hash, for the
    /// admission handler's auth check.
    async fn find_active_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKey>, PolicyError>;

    async fn tenant_summary(&self, tenant_id: Uuid) -> Result<Option<TenantSummary>, PolicyError>;
}
