use async_trait::async_trait;

use crate::error::StateError;

/// Outcome of one token-bucket, fixed-window or sliding-window primitive
/// call — the fields a [`crate::CounterBackend`] must return for the engine
/// to build a `Decision` (algorithm tag and headers are attached by the
/// engine, not the backend).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveResult {
    pub allowed: bool,
    pub remaining: i64,
    pub limit: i64,
    pub reset_at: i64,
    pub retry_after_ms: i64,
}

/// Outcome of a concurrency acquire. Distinct from [`PrimitiveResult`] only
/// in name, to keep the concurrency call site self-documenting; the engine
/// treats the two identically when building a `Decision`.
pub type ConcurrencyResult = PrimitiveResult;

/// Atomic operations against the shared counter store, one per rate-limit
/// algorithm (§4.2). Every method must execute as a single atomic
/// script/transaction: concurrent callers on the same key must never
/// observe intermediate state.
///
/// The four primitives have disjoint parameter shapes by design (§9
/// "Pluggable algorithms → tagged dispatch") — this trait is the seam the
/// decision engine dispatches across via the plan's `Algorithm` tag, not a
/// single generic get/set/increment interface.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Token bucket (§4.2 "Token Bucket").
    async fn token_bucket(
        &self,
        key: &str,
        capacity: i64,
        refill_rate_per_sec: f64,
        cost: i64,
        now_ms: i64,
    ) -> Result<PrimitiveResult, StateError>;

    /// Fixed window (§4.2 "Fixed Window"). `key` already encodes its window
    /// epoch (see `limitforge_core::key::derive_key`); this call increments
    /// and reads back the counter for that key alone.
    async fn fixed_window(
        &self,
        key: &str,
        limit: i64,
        window_sec: i64,
        cost: i64,
        now_ms: i64,
    ) -> Result<PrimitiveResult, StateError>;

    /// Sliding window log (§4.2 "Sliding Window"). `nonce` namespaces the
    /// per-call member strings so that two requests landing at the same
    /// `now_ms` with `cost > 1` do not collide (§9 open question, resolved).
    async fn sliding_window(
        &self,
        key: &str,
        limit: i64,
        window_sec: i64,
        cost: i64,
        now_ms: i64,
        nonce: u32,
    ) -> Result<PrimitiveResult, StateError>;

    /// Concurrency acquire (§4.2 "Concurrency"). Rolls back on block: if the
    /// post-increment count exceeds `limit`, the backend must decrement by
    /// `cost` again before returning.
    async fn concurrency_acquire(
        &self,
        key: &str,
        limit: i64,
        ttl_sec: i64,
        cost: i64,
        now_sec: i64,
    ) -> Result<ConcurrencyResult, StateError>;

    /// Release a previously acquired concurrency slot. Returns the new
    /// counter value; if decrementing would go negative, the backend
    /// deletes the key and returns `0` (§4.2 step 4, non-negativity
    /// invariant).
    async fn concurrency_release(&self, key: &str, cost: i64) -> Result<i64, StateError>;
}
