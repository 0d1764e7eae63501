use uuid::Uuid;

use limitforge_core::{Plan, SubjectType};

use crate::error::PolicyError;
use crate::store::PolicyStore;

/// Maps a request context to a [`Plan`] (spec.md §4.3).
///
/// Performs no caching of its own — spec.md §4.3 says explicitly "the
/// resolver performs no caching in the core; callers may wrap it" (see
/// DESIGN.md Open Question #4).
pub struct PlanResolver<'a> {
    store: &'a dyn PolicyStore,
}

impl<'a> PlanResolver<'a> {
    pub fn new(store: &'a dyn PolicyStore) -> Self {
        Self { store }
    }

    /// `resolve(tenant_id, resource, subject_type, explicit_plan_id?) ->
    /// Plan` (spec.md §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::PlanNotFound`] when neither path resolves a
    /// plan, or a store error on I/O failure.
    pub async fn resolve(
        &self,
        tenant_id: Uuid,
        resource: &str,
        subject_type: SubjectType,
        explicit_plan_id: Option<Uuid>,
    ) -> Result<Plan, PolicyError> {
        if let Some(plan_id) = explicit_plan_id {
            return self
                .store
                .get_plan_by_id(plan_id)
                .await?
                .ok_or(PolicyError::PlanNotFound);
        }

        self.store
            .resolve_plan(tenant_id, resource, subject_type)
            .await?
            .ok_or(PolicyError::PlanNotFound)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use limitforge_core::{Algorithm, ApiKey, Tenant};

    use crate::store::{NewPlan, NewResourcePolicy, TenantSummary};

    use super::*;

    struct FakeStore {
        plans_by_id: Vec<Plan>,
        resolved: Option<Plan>,
    }

    fn plan(id: Uuid, created_at: chrono::DateTime<Utc>) -> Plan {
        Plan {
            id,
            tenant_id: Uuid::nil(),
            name: "p".into(),
            algorithm: Algorithm::FixedWindow,
            limit_per_window: Some(10),
            window_seconds: Some(60),
            bucket_capacity: None,
            refill_rate_per_sec: None,
            concurrency_limit: None,
            cost_per_call: 1,
            burst_factor: 1.0,
            created_at,
        }
    }

    #[async_trait]
    impl PolicyStore for FakeStore {
        async fn get_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, PolicyError> {
            Ok(self.plans_by_id.iter().find(|p| p.id == plan_id).cloned())
        }

        async fn resolve_plan(
            &self,
            _tenant_id: Uuid,
            _resource: &str,
            _subject_type: SubjectType,
        ) -> Result<Option<Plan>, PolicyError> {
            Ok(self.resolved.clone())
        }

        async fn create_tenant(&self, _name: &str) -> Result<Tenant, PolicyError> {
            unimplemented!()
        }

        async fn create_plan(&self, _new_plan: NewPlan) -> Result<Plan, PolicyError> {
            unimplemented!()
        }

        async fn create_resource_policy(
            &self,
            _new_policy: NewResourcePolicy,
        ) -> Result<limitforge_core::ResourcePolicy, PolicyError> {
            unimplemented!()
        }

        async fn create_api_key(
            &self,
            _tenant_id: Uuid,
            _name: &str,
            _key_hash: &str,
        ) -> Result<ApiKey, PolicyError> {
            unimplemented!()
        }

        async fn find_active_api_key_by_hash(
            &self,
            _key_hash: &str,
        ) -> Result<Option<ApiKey>, PolicyError> {
            unimplemented!()
        }

        async fn tenant_summary(
            &self,
            _tenant_id: Uuid,
        ) -> Result<Option<TenantSummary>, PolicyError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn explicit_plan_id_skips_policy_lookup() {
        let id = Uuid::new_v4();
        let store = FakeStore {
            plans_by_id: vec![plan(id, Utc::now())],
            resolved: None,
        };
        let resolver = PlanResolver::new(&store);
        let resolved = resolver
            .resolve(Uuid::new_v4(), "GET:/x", SubjectType::ApiKey, Some(id))
            .await
            .unwrap();
        assert_eq!(resolved.id, id);
    }

    #[tokio::test]
    async fn explicit_plan_id_not_found_is_plan_not_found() {
        let store = FakeStore {
            plans_by_id: vec![],
            resolved: None,
        };
        let resolver = PlanResolver::new(&store);
        let err = resolver
            .resolve(Uuid::new_v4(), "GET:/x", SubjectType::ApiKey, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::PlanNotFound));
    }

    #[tokio::test]
    async fn policy_lookup_used_when_no_explicit_plan() {
        let id = Uuid::new_v4();
        let store = FakeStore {
            plans_by_id: vec![],
            resolved: Some(plan(id, Utc::now())),
        };
        let resolver = PlanResolver::new(&store);
        let resolved = resolver
            .resolve(Uuid::new_v4(), "GET:/x", SubjectType::ApiKey, None)
            .await
            .unwrap();
        assert_eq!(resolved.id, id);
    }

    #[tokio::test]
    async fn no_match_is_plan_not_found() {
        let store = FakeStore {
            plans_by_id: vec![],
            resolved: None,
        };
        let resolver = PlanResolver::new(&store);
        let err = resolver
            .resolve(Uuid::new_v4(), "GET:/x", SubjectType::ApiKey, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::PlanNotFound));
    }
}
