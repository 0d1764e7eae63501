use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::Script;

use limitforge_state::{CounterBackend, PrimitiveResult, StateError};

use crate::config::RedisConfig;
use crate::scripts;

/// Redis-backed implementation of [`CounterBackend`] (§6 "Shared counter
/// store"). Each algorithm primitive is one Lua script invocation, giving
/// atomicity across concurrent callers on the same key per §4.2.
pub struct RedisCounterBackend {
    pool: Pool,
    config: RedisConfig,
    token_bucket: Script,
    fixed_window: Script,
    sliding_window: Script,
    concurrency_acquire: Script,
    concurrency_release: Script,
}

impl RedisCounterBackend {
    /// Build a new backend from `config`, creating the connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Connection`] if the pool cannot be constructed
    /// (e.g. a malformed URL).
    pub fn new(config: RedisConfig) -> Result<Self, StateError> {
        let cfg = Config::from_url(config.effective_url());
        let pool = cfg
            .builder()
            .map_err(|e| StateError::Connection(e.to_string()))?
            .max_size(config.pool_size)
            .wait_timeout(Some(config.connection_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StateError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            config,
            token_bucket: Script::new(scripts::TOKEN_BUCKET),
            fixed_window: Script::new(scripts::FIXED_WINDOW),
            sliding_window: Script::new(scripts::SLIDING_WINDOW),
            concurrency_acquire: Script::new(scripts::CONCURRENCY_ACQUIRE),
            concurrency_release: Script::new(scripts::CONCURRENCY_RELEASE),
        })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, StateError> {
        self.pool
            .get()
            .await
            .map_err(|e| StateError::Connection(e.to_string()))
    }

    fn key(&self, key: &str) -> String {
        self.config.render_key(key)
    }
}

/// Decode the five-element `{allowed, remaining, limit, reset_at,
/// retry_after_ms}` reply shared by the four primitive scripts.
fn decode_primitive_result(raw: (i64, i64, i64, i64, i64)) -> PrimitiveResult {
    let (allowed, remaining, limit, reset_at, retry_after_ms) = raw;
    PrimitiveResult {
        allowed: allowed != 0,
        remaining,
        limit,
        reset_at,
        retry_after_ms,
    }
}

#[async_trait]
impl CounterBackend for RedisCounterBackend {
    async fn token_bucket(
        &self,
        key: &str,
        capacity: i64,
        refill_rate_per_sec: f64,
        cost: i64,
        now_ms: i64,
    ) -> Result<PrimitiveResult, StateError> {
        let mut conn = self.conn().await?;
        let raw: (i64, i64, i64, i64, i64) = self
            .token_bucket
            .key(self.key(key))
            .arg(capacity)
            .arg(refill_rate_per_sec)
            .arg(cost)
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(decode_primitive_result(raw))
    }

    async fn fixed_window(
        &self,
        key: &str,
        limit: i64,
        window_sec: i64,
        cost: i64,
        now_ms: i64,
    ) -> Result<PrimitiveResult, StateError> {
        let mut conn = self.conn().await?;
        let raw: (i64, i64, i64, i64, i64) = self
            .fixed_window
            .key(self.key(key))
            .arg(limit)
            .arg(window_sec)
            .arg(cost)
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(decode_primitive_result(raw))
    }

    async fn sliding_window(
        &self,
        key: &str,
        limit: i64,
        window_sec: i64,
        cost: i64,
        now_ms: i64,
        nonce: u32,
    ) -> Result<PrimitiveResult, StateError> {
        let mut conn = self.conn().await?;
        let raw: (i64, i64, i64, i64, i64) = self
            .sliding_window
            .key(self.key(key))
            .arg(limit)
            .arg(window_sec)
            .arg(cost)
            .arg(now_ms)
            .arg(nonce)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(decode_primitive_result(raw))
    }

    async fn concurrency_acquire(
        &self,
        key: &str,
        limit: i64,
        ttl_sec: i64,
        cost: i64,
        now_sec: i64,
    ) -> Result<PrimitiveResult, StateError> {
        let mut conn = self.conn().await?;
        let raw: (i64, i64, i64, i64, i64) = self
            .concurrency_acquire
            .key(self.key(key))
            .arg(limit)
            .arg(ttl_sec)
            .arg(cost)
            .arg(now_sec)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(decode_primitive_result(raw))
    }

    async fn concurrency_release(&self, key: &str, cost: i64) -> Result<i64, StateError> {
        let mut conn = self.conn().await?;
        let n: i64 = self
            .concurrency_release
            .key(self.key(key))
            .arg(cost)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(n)
    }
}
