//! In-memory [`PolicyStore`], mirroring `limitforge-state-memory`'s role
//! for the counter store: used by integration tests and single-process
//! deployments that don't need a real Postgres instance (SPEC_FULL.md §8
//! "Tests exercise the in-memory counter backend and policy store").

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use limitforge_core::{ApiKey, Plan, ResourcePolicy, SubjectType, Tenant};

use crate::error::PolicyError;
use crate::store::{NewPlan, NewResourcePolicy, PolicyStore, TenantSummary};

#[derive(Default)]
struct Inner {
    tenants: Vec<Tenant>,
    plans: Vec<Plan>,
    resource_policies: Vec<ResourcePolicy>,
    api_keys: Vec<ApiKey>,
}

/// In-memory [`PolicyStore`] backed by a single [`Mutex`]. Every call
/// clones what it needs and releases the lock before returning, so it is
/// never held across an `.await` point.
#[derive(Default)]
pub struct MemoryPolicyStore {
    inner: Mutex<Inner>,
}

impl MemoryPolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, PolicyError> {
        let inner = self.inner.lock().expect("policy store mutex poisoned");
        Ok(inner.plans.iter().find(|p| p.id == plan_id).cloned())
    }

    async fn resolve_plan(
        &self,
        tenant_id: Uuid,
        resource: &str,
        subject_type: SubjectType,
    ) -> Result<Option<Plan>, PolicyError> {
        let inner = self.inner.lock().expect("policy store mutex poisoned");
        let plan_id = inner
            .resource_policies
            .iter()
            .filter(|rp| {
                rp.tenant_id == tenant_id && rp.resource == resource && rp.subject_type == subject_type
            })
            .max_by_key(|rp| {
                inner
                    .plans
                    .iter()
                    .find(|p| p.id == rp.plan_id)
                    .map(|p| p.created_at)
            })
            .map(|rp| rp.plan_id);

        Ok(plan_id.and_then(|id| inner.plans.iter().find(|p| p.id == id).cloned()))
    }

    async fn create_tenant(&self, name: &str) -> Result<Tenant, PolicyError> {
        let tenant = Tenant {
            id: Uuid::now_v7(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };
        let mut inner = self.inner.lock().expect("policy store mutex poisoned");
        inner.tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn create_plan(&self, new_plan: NewPlan) -> Result<Plan, PolicyError> {
        let plan = Plan {
            id: Uuid::now_v7(),
            tenant_id: new_plan.tenant_id,
            name: new_plan.name,
            algorithm: new_plan.algorithm,
            limit_per_window: new_plan.limit_per_window,
            window_seconds: new_plan.window_seconds,
            bucket_capacity: new_plan.bucket_capacity,
            refill_rate_per_sec: new_plan.refill_rate_per_sec,
            concurrency_limit: new_plan.concurrency_limit,
            cost_per_call: new_plan.cost_per_call,
            burst_factor: new_plan.burst_factor,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.lock().expect("policy store mutex poisoned");
        inner.plans.push(plan.clone());
        Ok(plan)
    }

    async fn create_resource_policy(
        &self,
        new_policy: NewResourcePolicy,
    ) -> Result<ResourcePolicy, PolicyError> {
        let policy = ResourcePolicy {
            id: Uuid::now_v7(),
            tenant_id: new_policy.tenant_id,
            resource: new_policy.resource,
            subject_type: new_policy.subject_type,
            plan_id: new_policy.plan_id,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.lock().expect("policy store mutex poisoned");
        inner.resource_policies.push(policy.clone());
        Ok(policy)
    }

    async fn create_api_key(
        &self,
        tenant_id: Uuid,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, PolicyError> {
        let key = ApiKey {
            id: Uuid::now_v7(),
            tenant_id,
            name: name.to_owned(),
            key_hash: key_hash.to_owned(),
            active: true,
            created_at: Utc::now(),
            revoked_at: None,
        };
        let mut inner = self.inner.lock().expect("policy store mutex poisoned");
        inner.api_keys.push(key.clone());
        Ok(key)
    }

    async fn find_active_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKey>, PolicyError> {
        let inner = self.inner.lock().expect("policy store mutex poisoned");
        Ok(inner
            .api_keys
            .iter()
            .find(|k| k.key_hash == key_hash && k.active && k.revoked_at.is_none())
            .cloned())
    }

    async fn tenant_summary(&self, tenant_id: Uuid) -> Result<Option<TenantSummary>, PolicyError> {
        let inner = self.inner.lock().expect("policy store mutex poisoned");
        let Some(tenant) = inner.tenants.iter().find(|t| t.id == tenant_id).cloned() else {
            return Ok(None);
        };
        let plan_count = inner.plans.iter().filter(|p| p.tenant_id == tenant_id).count() as i64;
        let policy_count = inner
            .resource_policies
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .count() as i64;
        let api_key_count = inner
            .api_keys
            .iter()
            .filter(|k| k.tenant_id == tenant_id)
            .count() as i64;

        Ok(Some(TenantSummary {
            tenant,
            plan_count,
            policy_count,
            api_key_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use limitforge_core::Algorithm;

    use super::*;

    #[tokio::test]
    async fn resolves_most_recently_created_matching_plan() {
        let store = MemoryPolicyStore::new();
        let tenant = store.create_tenant("acme").await.unwrap();

        let older = store
            .create_plan(NewPlan {
                tenant_id: tenant.id,
                name: "older".into(),
                algorithm: Algorithm::FixedWindow,
                limit_per_window: Some(10),
                window_seconds: Some(60),
                bucket_capacity: None,
                refill_rate_per_sec: None,
                concurrency_limit: None,
                cost_per_call: 1,
                burst_factor: 1.0,
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let newer = store
            .create_plan(NewPlan {
                tenant_id: tenant.id,
                name: "newer".into(),
                algorithm: Algorithm::FixedWindow,
                limit_per_window: Some(20),
                window_seconds: Some(60),
                bucket_capacity: None,
                refill_rate_per_sec: None,
                concurrency_limit: None,
                cost_per_call: 1,
                burst_factor: 1.0,
            })
            .await
            .unwrap();

        store
            .create_resource_policy(NewResourcePolicy {
                tenant_id: tenant.id,
                resource: "GET:/demo".into(),
                subject_type: SubjectType::ApiKey,
                plan_id: older.id,
            })
            .await
            .unwrap();
        store
            .create_resource_policy(NewResourcePolicy {
                tenant_id: tenant.id,
                resource: "GET:/demo".into(),
                subject_type: SubjectType::ApiKey,
                plan_id: newer.id,
            })
            .await
            .unwrap();

        let resolved = store
            .resolve_plan(tenant.id, "GET:/demo", SubjectType::ApiKey)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, newer.id);
    }

    #[tokio::test]
    async fn api_key_lookup_excludes_revoked_and_inactive() {
        let store = MemoryPolicyStore::new();
        let tenant = store.create_tenant("acme").await.unwrap();
        store
            .create_api_key(tenant.id, "k1", "hash-1")
            .await
            .unwrap();

        let found = store
            .find_active_api_key_by_hash("hash-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.tenant_id, tenant.id);

        assert!(store
            .find_active_api_key_by_hash("does-not-exist")
            .await
            .unwrap()
            .is_none());
    }
}
