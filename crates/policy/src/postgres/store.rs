use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use limitforge_core::{Algorithm, ApiKey, Plan, ResourcePolicy, SubjectType, Tenant};

use crate::error::PolicyError;
use crate::store::{NewPlan, NewResourcePolicy, PolicyStore, TenantSummary};

use super::config::PostgresConfig;
use super::migrations;

/// `PostgreSQL`-backed [`PolicyStore`] (§6 "Policy store": "any relational
/// store supporting the schema implied by §3 with referential integrity on
/// `tenant_id`/`plan_id` and cascade delete").
pub struct PostgresPolicyStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresPolicyStore {
    /// Connect, build the pool, and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Connection`] if the pool cannot be built, or
    /// [`PolicyError::Query`] if migrations fail.
    pub async fn connect(config: PostgresConfig) -> Result<Self, PolicyError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url)
            .await
            .map_err(|e| PolicyError::Connection(e.to_string()))?;

        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| PolicyError::Query(e.to_string()))?;

        Ok(Self { pool, config })
    }

    /// Build a store from an already-connected pool, e.g. one shared with
    /// another component. Runs migrations on creation.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Query`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, PolicyError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| PolicyError::Query(e.to_string()))?;
        Ok(Self { pool, config })
    }
}

fn algorithm_to_db(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::TokenBucket => "token_bucket",
        Algorithm::FixedWindow => "fixed_window",
        Algorithm::SlidingWindow => "sliding_window",
        Algorithm::Concurrency => "concurrency",
        Algorithm::Unknown => "unknown",
    }
}

fn algorithm_from_db(s: &str) -> Algorithm {
    match s {
        "token_bucket" => Algorithm::TokenBucket,
        "fixed_window" => Algorithm::FixedWindow,
        "sliding_window" => Algorithm::SlidingWindow,
        "concurrency" => Algorithm::Concurrency,
        _ => Algorithm::Unknown,
    }
}

fn subject_type_to_db(subject_type: SubjectType) -> &'static str {
    match subject_type {
        SubjectType::ApiKey => "api_key",
        SubjectType::Ip => "ip",
        SubjectType::UserId => "user_id",
    }
}

fn subject_type_from_db(s: &str) -> SubjectType {
    match s {
        "ip" => SubjectType::Ip,
        "user_id" => SubjectType::UserId,
        _ => SubjectType::ApiKey,
    }
}

fn row_to_plan(row: &sqlx::postgres::PgRow) -> Result<Plan, PolicyError> {
    Ok(Plan {
        id: row.try_get("id").map_err(db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        algorithm: algorithm_from_db(row.try_get::<String, _>("algorithm").map_err(db_err)?.as_str()),
        limit_per_window: row.try_get("limit_per_window").map_err(db_err)?,
        window_seconds: row.try_get("window_seconds").map_err(db_err)?,
        bucket_capacity: row.try_get("bucket_capacity").map_err(db_err)?,
        refill_rate_per_sec: row.try_get("refill_rate_per_sec").map_err(db_err)?,
        concurrency_limit: row.try_get("concurrency_limit").map_err(db_err)?,
        cost_per_call: row.try_get("cost_per_call").map_err(db_err)?,
        burst_factor: row.try_get("burst_factor").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn row_to_tenant(row: &sqlx::postgres::PgRow) -> Result<Tenant, PolicyError> {
    Ok(Tenant {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn row_to_resource_policy(row: &sqlx::postgres::PgRow) -> Result<ResourcePolicy, PolicyError> {
    Ok(ResourcePolicy {
        id: row.try_get("id").map_err(db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(db_err)?,
        resource: row.try_get("resource").map_err(db_err)?,
        subject_type: subject_type_from_db(
            row.try_get::<String, _>("subject_type").map_err(db_err)?.as_str(),
        ),
        plan_id: row.try_get("plan_id").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn row_to_api_key(row: &sqlx::postgres::PgRow) -> Result<ApiKey, PolicyError> {
    Ok(ApiKey {
        id: row.try_get("id").map_err(db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        key_hash: row.try_get("key_hash").map_err(db_err)?,
        active: row.try_get("active").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        revoked_at: row.try_get("revoked_at").map_err(db_err)?,
    })
}

fn db_err(e: sqlx::Error) -> PolicyError {
    PolicyError::Query(e.to_string())
}

#[async_trait]
impl PolicyStore for PostgresPolicyStore {
    async fn get_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, PolicyError> {
        let plans = self.config.table("plans");
        let row = sqlx::query(&format!("SELECT * FROM {plans} WHERE id = $1"))
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn resolve_plan(
        &self,
        tenant_id: Uuid,
        resource: &str,
        subject_type: SubjectType,
    ) -> Result<Option<Plan>, PolicyError> {
        let plans = self.config.table("plans");
        let resource_policies = self.config.table("resource_policies");
        let query = format!(
            "SELECT p.* FROM {plans} p
             JOIN {resource_policies} rp ON rp.plan_id = p.id
             WHERE rp.tenant_id = $1 AND rp.resource = $2 AND rp.subject_type = $3
             ORDER BY p.created_at DESC
             LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(tenant_id)
            .bind(resource)
            .bind(subject_type_to_db(subject_type))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn create_tenant(&self, name: &str) -> Result<Tenant, PolicyError> {
        let tenants = self.config.table("tenants");
        let id = Uuid::now_v7();
        let created_at: DateTime<Utc> = Utc::now();
        sqlx::query(&format!(
            "INSERT INTO {tenants} (id, name, created_at) VALUES ($1, $2, $3)"
        ))
        .bind(id)
        .bind(name)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Tenant {
            id,
            name: name.to_owned(),
            created_at,
        })
    }

    async fn create_plan(&self, new_plan: NewPlan) -> Result<Plan, PolicyError> {
        let plans = self.config.table("plans");
        let id = Uuid::now_v7();
        let created_at: DateTime<Utc> = Utc::now();
        sqlx::query(&format!(
            "INSERT INTO {plans}
                (id, tenant_id, name, algorithm, limit_per_window, window_seconds,
                 bucket_capacity, refill_rate_per_sec, concurrency_limit,
                 cost_per_call, burst_factor, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(id)
        .bind(new_plan.tenant_id)
        .bind(&new_plan.name)
        .bind(algorithm_to_db(new_plan.algorithm))
        .bind(new_plan.limit_per_window)
        .bind(new_plan.window_seconds)
        .bind(new_plan.bucket_capacity)
        .bind(new_plan.refill_rate_per_sec)
        .bind(new_plan.concurrency_limit)
        .bind(new_plan.cost_per_call)
        .bind(new_plan.burst_factor)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Plan {
            id,
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
            created_at,
        })
    }

    async fn create_resource_policy(
        &self,
        new_policy: NewResourcePolicy,
    ) -> Result<ResourcePolicy, PolicyError> {
        let resource_policies = self.config.table("resource_policies");
        let id = Uuid::now_v7();
        let created_at: DateTime<Utc> = Utc::now();
        sqlx::query(&format!(
            "INSERT INTO {resource_policies}
                (id, tenant_id, resource, subject_type, plan_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(id)
        .bind(new_policy.tenant_id)
        .bind(&new_policy.resource)
        .bind(subject_type_to_db(new_policy.subject_type))
        .bind(new_policy.plan_id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(ResourcePolicy {
            id,
            tenant_id: new_policy.tenant_id,
            resource: new_policy.resource,
            subject_type: new_policy.subject_type,
            plan_id: new_policy.plan_id,
            created_at,
        })
    }

    async fn create_api_key(
        &self,
        tenant_id: Uuid,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, PolicyError> {
        let api_keys = self.config.table("api_keys");
        let id = Uuid::now_v7();
        let created_at: DateTime<Utc> = Utc::now();
        sqlx::query(&format!(
            "INSERT INTO {api_keys} (id, tenant_id, name, key_hash, active, created_at)
             VALUES ($1, $2, $3, $4, TRUE, $5)"
        ))
        .bind(id)
        .bind(tenant_id)
        .bind(name)
        .bind(key_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(ApiKey {
            id,
            tenant_id,
            name: name.to_owned(),
            key_hash: key_hash.to_owned(),
            active: true,
            created_at,
            revoked_at: None,
        })
    }

    async fn find_active_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKey>, PolicyError> {
        let api_keys = self.config.table("api_keys");
        let row = sqlx::query(&format!(
            "SELECT * FROM {api_keys} WHERE key_hash = $1 AND active = TRUE AND revoked_at IS NULL"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn tenant_summary(&self, tenant_id: Uuid) -> Result<Option<TenantSummary>, PolicyError> {
        let tenants = self.config.table("tenants");
        let plans = self.config.table("plans");
        let resource_policies = self.config.table("resource_policies");
        let api_keys = self.config.table("api_keys");

        let tenant_row = sqlx::query(&format!("SELECT * FROM {tenants} WHERE id = $1"))
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        let Some(tenant_row) = tenant_row else {
            return Ok(None);
        };
        let tenant = row_to_tenant(&tenant_row)?;

        let plan_count: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS n FROM {plans} WHERE tenant_id = $1"
        ))
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .try_get("n")
        .map_err(db_err)?;

        let policy_count: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS n FROM {resource_policies} WHERE tenant_id = $1"
        ))
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .try_get("n")
        .map_err(db_err)?;

        let api_key_count: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS n FROM {api_keys} WHERE tenant_id = $1"
        ))
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .try_get("n")
        .map_err(db_err)?;

        Ok(Some(TenantSummary {
            tenant,
            plan_count,
            policy_count,
            api_key_count,
        }))
    }
}
