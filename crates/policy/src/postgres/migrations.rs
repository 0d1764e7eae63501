use sqlx::PgPool;

use super::config::PostgresConfig;

/// Run database migrations, creating the tenants/plans/resource_policies/
/// api_keys tables if they do not exist (§3, §6 "Policy store").
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let tenants = config.table("tenants");
    let plans = config.table("plans");
    let resource_policies = config.table("resource_policies");
    let api_keys = config.table("api_keys");

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {tenants} (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {plans} (
            id UUID PRIMARY KEY,
            tenant_id UUID NOT NULL REFERENCES {tenants}(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            algorithm TEXT NOT NULL,
            limit_per_window BIGINT,
            window_seconds BIGINT,
            bucket_capacity BIGINT,
            refill_rate_per_sec DOUBLE PRECISION,
            concurrency_limit BIGINT,
            cost_per_call BIGINT NOT NULL DEFAULT 1,
            burst_factor DOUBLE PRECISION NOT NULL DEFAULT 1.0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {resource_policies} (
            id UUID PRIMARY KEY,
            tenant_id UUID NOT NULL REFERENCES {tenants}(id) ON DELETE CASCADE,
            resource TEXT NOT NULL,
            subject_type TEXT NOT NULL,
            plan_id UUID NOT NULL REFERENCES {plans}(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {}_lookup_idx
            ON {resource_policies} (tenant_id, resource, subject_type)",
        config.table_prefix.trim_end_matches('_')
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {api_keys} (
            id UUID PRIMARY KEY,
            tenant_id UUID NOT NULL REFERENCES {tenants}(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            key_hash TEXT NOT NULL UNIQUE,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            revoked_at TIMESTAMPTZ
        )"
    ))
    .execute(pool)
    .await?;

    Ok(())
}
