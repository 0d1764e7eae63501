use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use limitforge_core::{derive_key, Algorithm, Decision, Plan};
use limitforge_state::CounterBackend;

use crate::error::EngineError;
use crate::metrics::EngineMetrics;

/// Orchestrates one rate-limit check: derives the shared-store key, dispatches
/// to the algorithm primitive named by the plan, and decorates the result
/// with response headers (spec.md §4.4).
///
/// Stateless beyond its handles to the shared counter store and its own
/// metrics; one instance is constructed at startup and shared across every
/// request (SPEC_FULL.md §9 "Global engine singleton").
pub struct DecisionEngine {
    counters: Arc<dyn CounterBackend>,
    metrics: EngineMetrics,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(counters: Arc<dyn CounterBackend>) -> Self {
        Self {
            counters,
            metrics: EngineMetrics::new(),
        }
    }

    #[must_use]
    pub fn with_metrics(counters: Arc<dyn CounterBackend>, metrics: EngineMetrics) -> Self {
        Self { counters, metrics }
    }

    #[must_use]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// `check(tenant, subject, resource, cost, plan) -> Decision` (spec.md
    /// §4.4). `now_ms` is threaded through explicitly so tests can drive
    /// the clock.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UpstreamUnavailable`] if the counter store
    /// call fails or times out; never silently allows or blocks (§4.2
    /// "Failure semantics").
    #[instrument(name = "engine.check", skip(self, plan), fields(algorithm = %plan.algorithm))]
    pub async fn check(
        &self,
        tenant: &str,
        subject: &str,
        resource: &str,
        cost: i64,
        plan: &Plan,
        now_ms: i64,
    ) -> Result<Decision, EngineError> {
        let algorithm = plan.algorithm;
        let now_sec = now_ms / 1000;
        let window_seconds = plan.window_seconds.unwrap_or(60);

        let key = derive_key(algorithm, tenant, subject, resource, window_seconds, now_sec);
        let started = Instant::now();

        let result = match algorithm {
            Algorithm::TokenBucket | Algorithm::Unknown => {
                let capacity = plan
                    .bucket_capacity
                    .or(plan.limit_per_window)
                    .unwrap_or(0);
                let refill = plan.refill_rate_per_sec.unwrap_or(0.0);
                self.counters
                    .token_bucket(&key, capacity, refill, cost, now_ms)
                    .await?
            }
            Algorithm::FixedWindow => {
                let limit = plan
                    .limit_per_window
                    .or(plan.bucket_capacity)
                    .unwrap_or(0);
                self.counters
                    .fixed_window(&key, limit, window_seconds, cost, now_ms)
                    .await?
            }
            Algorithm::SlidingWindow => {
                let limit = plan
                    .limit_per_window
                    .or(plan.bucket_capacity)
                    .unwrap_or(0);
                let nonce: u32 = rand::random();
                self.counters
                    .sliding_window(&key, limit, window_seconds, cost, now_ms, nonce)
                    .await?
            }
            Algorithm::Concurrency => {
                let limit = plan.concurrency_limit.unwrap_or(1);
                let ttl = plan.window_seconds.unwrap_or(60);
                self.counters
                    .concurrency_acquire(&key, limit, ttl, cost, now_sec)
                    .await?
            }
        };

        self.metrics
            .observe(algorithm.as_str(), result.allowed, started.elapsed());

        Ok(Decision {
            allowed: result.allowed,
            remaining: result.remaining,
            limit: result.limit,
            reset_at: result.reset_at,
            retry_after_ms: result.retry_after_ms,
            algorithm: algorithm.as_str().to_owned(),
            headers: std::collections::HashMap::new(),
        }
        .with_standard_headers())
    }

    /// Release a previously acquired concurrency slot (§4.2 step 4). The
    /// engine exposes this but never calls it itself; external callers
    /// invoke it when the in-flight work finishes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UpstreamUnavailable`] on a counter-store
    /// failure.
    pub async fn release_concurrency(
        &self,
        tenant: &str,
        subject: &str,
        resource: &str,
        cost: i64,
    ) -> Result<i64, EngineError> {
        let key = derive_key(Algorithm::Concurrency, tenant, subject, resource, 0, 0);
        Ok(self.counters.concurrency_release(&key, cost).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use limitforge_core::SubjectType;
    use limitforge_state_memory::MemoryCounterBackend;

    use super::*;

    fn plan(algorithm: Algorithm) -> Plan {
        Plan {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            name: "p".into(),
            algorithm,
            limit_per_window: None,
            window_seconds: None,
            bucket_capacity: None,
            refill_rate_per_sec: None,
            concurrency_limit: None,
            cost_per_call: 1,
            burst_factor: 1.0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fixed_window_blocks_third_call() {
        let engine = DecisionEngine::new(Arc::new(MemoryCounterBackend::new()));
        let plan = Plan {
            limit_per_window: Some(2),
            window_seconds: Some(60),
            ..plan(Algorithm::FixedWindow)
        };

        let d1 = engine
            .check("t1", "u:1", "GET:/demo", 1, &plan, 0)
            .await
            .unwrap();
        let d2 = engine
            .check("t1", "u:1", "GET:/demo", 1, &plan, 1_000)
            .await
            .unwrap();
        let d3 = engine
            .check("t1", "u:1", "GET:/demo", 1, &plan, 2_000)
            .await
            .unwrap();

        assert!(d1.allowed);
        assert!(d2.allowed);
        assert_eq!(d2.remaining, 0);
        assert!(!d3.allowed);
        assert_eq!(d3.remaining, 0);
        assert!(d3.retry_after_ms >= 0);
    }

    #[tokio::test]
    async fn unknown_algorithm_falls_back_to_token_bucket() {
        let engine = DecisionEngine::new(Arc::new(MemoryCounterBackend::new()));
        let plan = Plan {
            limit_per_window: Some(3),
            ..plan(Algorithm::Unknown)
        };

        let decision = engine
            .check("t1", "ip:1.2.3.4", "POST:/x", 1, &plan, 0)
            .await
            .unwrap();

        assert!(decision.allowed);
        assert_eq!(decision.algorithm, "token_bucket");
    }

    #[tokio::test]
    async fn concurrency_roundtrip_acquire_and_release() {
        let engine = DecisionEngine::new(Arc::new(MemoryCounterBackend::new()));
        let plan = Plan {
            concurrency_limit: Some(1),
            window_seconds: Some(1),
            ..plan(Algorithm::Concurrency)
        };

        let d1 = engine.check("t1", "u:1", "r", 1, &plan, 0).await.unwrap();
        assert!(d1.allowed);

        let d2 = engine.check("t1", "u:1", "r", 1, &plan, 0).await.unwrap();
        assert!(!d2.allowed);

        engine
            .release_concurrency("t1", "u:1", "r", 1)
            .await
            .unwrap();

        let d3 = engine.check("t1", "u:1", "r", 1, &plan, 0).await.unwrap();
        assert!(d3.allowed);
    }

    #[tokio::test]
    async fn headers_are_populated_on_block() {
        let engine = DecisionEngine::new(Arc::new(MemoryCounterBackend::new()));
        let plan = Plan {
            concurrency_limit: Some(0),
            window_seconds: Some(30),
            ..plan(Algorithm::Concurrency)
        };
        let decision = engine
            .check("t1", "u:1", "r", 1, &plan, 0)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.headers["X-RateLimit-Remaining"], "0");
        assert_eq!(decision.headers["Retry-After"], "30");
        let _ = SubjectType::ApiKey;
    }
}
