use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::time::Instant;

use limitforge_state::{CounterBackend, PrimitiveResult, StateError};

/// State held per key, tagged by which algorithm created it. Keys are
/// namespaced by algorithm (`lf:tb:...`, `lf:fw:...`, ...) so a given key
/// only ever holds one variant.
#[derive(Debug, Clone)]
enum Payload {
    TokenBucket { tokens: f64, ts_ms: i64 },
    Counter(i64),
    SlidingWindow(Vec<(i64, String)>),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    payload: Payload,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

fn expiry_from_secs(ttl_sec: i64) -> Option<Instant> {
    u64::try_from(ttl_sec)
        .ok()
        .map(|secs| Instant::now() + Duration::from_secs(secs))
}

fn expiry_from_millis(ttl_ms: i64) -> Option<Instant> {
    u64::try_from(ttl_ms)
        .ok()
        .map(|ms| Instant::now() + Duration::from_millis(ms))
}

/// In-memory [`CounterBackend`] backed by a [`DashMap`], used for tests and
/// single-node deployments (§6 "Shared counter store": "any store providing
/// atomic scripted mutation..."). `DashMap`'s sharded entry API gives the
/// same per-key atomicity a Lua script gives the Redis backend: the whole
/// read-modify-write for one call happens while the shard's lock for that
/// key is held, so a concurrent caller on the same key never observes
/// intermediate state.
#[derive(Default)]
pub struct MemoryCounterBackend {
    data: DashMap<String, StoredEntry>,
}

impl MemoryCounterBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterBackend for MemoryCounterBackend {
    async fn token_bucket(
        &self,
        key: &str,
        capacity: i64,
        refill_rate_per_sec: f64,
        cost: i64,
        now_ms: i64,
    ) -> Result<PrimitiveResult, StateError> {
        let capacity_f = capacity as f64;
        let ttl = if refill_rate_per_sec > 0.0 {
            expiry_from_secs((capacity as f64 / refill_rate_per_sec) as i64 + 5)
        } else {
            expiry_from_secs(3600)
        };

        let (tokens, ts) = match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(occ) if !occ.get().is_expired() => match occ.get().payload {
                Payload::TokenBucket { tokens, ts_ms } => (tokens, ts_ms),
                _ => (capacity_f, now_ms),
            },
            _ => (capacity_f, now_ms),
        };

        let elapsed_ms = (now_ms - ts).max(0);
        let mut tokens = tokens + (elapsed_ms as f64 / 1000.0) * refill_rate_per_sec;
        if tokens > capacity_f {
            tokens = capacity_f;
        }

        let allowed = tokens >= cost as f64;
        if allowed {
            tokens -= cost as f64;
        }

        self.data.insert(
            key.to_owned(),
            StoredEntry {
                payload: Payload::TokenBucket { tokens, ts_ms: now_ms },
                expires_at: ttl,
            },
        );

        let retry_after_ms = if allowed {
            0
        } else if refill_rate_per_sec > 0.0 {
            (((cost as f64 - tokens) / refill_rate_per_sec) * 1000.0).ceil() as i64
        } else {
            3_600_000
        };

        Ok(PrimitiveResult {
            allowed,
            remaining: tokens.floor() as i64,
            limit: capacity,
            reset_at: (now_ms + retry_after_ms).div_ceil(1000),
            retry_after_ms,
        })
    }

    async fn fixed_window(
        &self,
        key: &str,
        limit: i64,
        window_sec: i64,
        cost: i64,
        now_ms: i64,
    ) -> Result<PrimitiveResult, StateError> {
        let counter = match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(mut occ) if !occ.get().is_expired() => {
                let new_value = match occ.get().payload {
                    Payload::Counter(n) => n + cost,
                    _ => cost,
                };
                occ.get_mut().payload = Payload::Counter(new_value);
                new_value
            }
            _ => {
                self.data.insert(
                    key.to_owned(),
                    StoredEntry {
                        payload: Payload::Counter(cost),
                        expires_at: expiry_from_secs(window_sec),
                    },
                );
                cost
            }
        };

        let allowed = counter <= limit;
        let remaining = (limit - counter).max(0);

        let now_sec = now_ms / 1000;
        let window_start = now_sec - now_sec.rem_euclid(window_sec.max(1));
        let reset_at = window_start + window_sec;

        let retry_after_ms = if allowed {
            0
        } else {
            (reset_at * 1000 - now_ms).max(0)
        };

        Ok(PrimitiveResult {
            allowed,
            remaining,
            limit,
            reset_at,
            retry_after_ms,
        })
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
        let window_ms = window_sec * 1000;
        let cutoff = now_ms - window_ms;

        let mut entries = match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(occ) if !occ.get().is_expired() => match &occ.get().payload {
                Payload::SlidingWindow(v) => v.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        entries.retain(|(score, _)| *score > cutoff);

        let count = entries.len() as i64;
        let allowed = count + cost <= limit;

        if allowed {
            for i in 0..cost {
                let member = format!("{now_ms}:{nonce}:{i}");
                entries.push((now_ms + i, member));
            }
        }

        let earliest = entries.iter().map(|(score, _)| *score).min().unwrap_or(now_ms);

        let retry_after_ms = if allowed {
            0
        } else {
            (earliest + window_ms - now_ms).max(0)
        };

        let used = count + if allowed { cost } else { 0 };
        let remaining = (limit - used).max(0);
        let reset_at = (earliest + window_ms).div_ceil(1000);

        self.data.insert(
            key.to_owned(),
            StoredEntry {
                payload: Payload::SlidingWindow(entries),
                expires_at: expiry_from_millis(window_ms + 1000),
            },
        );

        Ok(PrimitiveResult {
            allowed,
            remaining,
            limit,
            reset_at,
            retry_after_ms,
        })
    }

    async fn concurrency_acquire(
        &self,
        key: &str,
        limit: i64,
        ttl_sec: i64,
        cost: i64,
        now_sec: i64,
    ) -> Result<PrimitiveResult, StateError> {
        let (n, allowed) = match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(mut occ) if !occ.get().is_expired() => {
                let current = match occ.get().payload {
                    Payload::Counter(n) => n,
                    _ => 0,
                };
                let candidate = current + cost;
                if candidate <= limit {
                    occ.get_mut().payload = Payload::Counter(candidate);
                    (candidate, true)
                } else {
                    (current, false)
                }
            }
            _ => {
                let expires_at = expiry_from_secs(ttl_sec);
                if cost <= limit {
                    self.data.insert(
                        key.to_owned(),
                        StoredEntry {
                            payload: Payload::Counter(cost),
                            expires_at,
                        },
                    );
                    (cost, true)
                } else {
                    self.data.insert(
                        key.to_owned(),
                        StoredEntry {
                            payload: Payload::Counter(0),
                            expires_at,
                        },
                    );
                    (0, false)
                }
            }
        };

        let remaining = if allowed { (limit - n).max(0) } else { 0 };
        let retry_after_ms = if allowed { 0 } else { ttl_sec * 1000 };
        let reset_at = now_sec + ttl_sec;

        Ok(PrimitiveResult {
            allowed,
            remaining,
            limit,
            reset_at,
            retry_after_ms,
        })
    }

    async fn concurrency_release(&self, key: &str, cost: i64) -> Result<i64, StateError> {
        match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(mut occ) => {
                let current = match occ.get().payload {
                    Payload::Counter(n) => n,
                    _ => 0,
                };
                let updated = current - cost;
                if updated < 0 {
                    occ.remove();
                    Ok(0)
                } else {
                    occ.get_mut().payload = Payload::Counter(updated);
                    Ok(updated)
                }
            }
            MapEntry::Vacant(_) => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_bucket_drains_and_refills() {
        let backend = MemoryCounterBackend::new();
        let r1 = backend
            .token_bucket("lf:tb:t:u:r", 5, 2.0, 5, 0)
            .await
            .unwrap();
        assert!(r1.allowed);
        assert_eq!(r1.remaining, 0);

        let r2 = backend
            .token_bucket("lf:tb:t:u:r", 5, 2.0, 1, 100)
            .await
            .unwrap();
        assert!(!r2.allowed);
        assert!(r2.retry_after_ms > 0);

        let r3 = backend
            .token_bucket("lf:tb:t:u:r", 5, 2.0, 1, 1000)
            .await
            .unwrap();
        assert!(r3.allowed);

        let r4 = backend
            .token_bucket("lf:tb:t:u:r", 5, 2.0, 0, 10_000)
            .await
            .unwrap();
        assert_eq!(r4.remaining, 5);
    }

    #[tokio::test]
    async fn fixed_window_blocks_third_call() {
        let backend = MemoryCounterBackend::new();
        let r1 = backend.fixed_window("lf:fw:t:u:r:0", 2, 60, 1, 0).await.unwrap();
        let r2 = backend.fixed_window("lf:fw:t:u:r:0", 2, 60, 1, 1_000).await.unwrap();
        let r3 = backend.fixed_window("lf:fw:t:u:r:0", 2, 60, 1, 2_000).await.unwrap();
        assert!(r1.allowed);
        assert!(r2.allowed);
        assert_eq!(r2.remaining, 0);
        assert!(!r3.allowed);
    }

    #[tokio::test]
    async fn sliding_window_evicts_stale_entries() {
        let backend = MemoryCounterBackend::new();
        let r1 = backend
            .sliding_window("lf:sw:t:u:r", 2, 1, 1, 0, 1)
            .await
            .unwrap();
        let r2 = backend
            .sliding_window("lf:sw:t:u:r", 2, 1, 1, 10, 2)
            .await
            .unwrap();
        let r3 = backend
            .sliding_window("lf:sw:t:u:r", 2, 1, 1, 20, 3)
            .await
            .unwrap();
        assert!(r1.allowed);
        assert!(r2.allowed);
        assert!(!r3.allowed);
        assert_eq!(r3.remaining, 0);
    }

    #[tokio::test]
    async fn concurrency_rolls_back_on_block_and_releases() {
        let backend = MemoryCounterBackend::new();
        let a1 = backend.concurrency_acquire("lf:cc:t:u:r", 2, 1, 1, 0).await.unwrap();
        let a2 = backend.concurrency_acquire("lf:cc:t:u:r", 2, 1, 1, 0).await.unwrap();
        let a3 = backend.concurrency_acquire("lf:cc:t:u:r", 2, 1, 1, 0).await.unwrap();
        assert!(a1.allowed);
        assert!(a2.allowed);
        assert!(!a3.allowed);

        let released = backend.concurrency_release("lf:cc:t:u:r", 1).await.unwrap();
        assert_eq!(released, 1);

        let a4 = backend.concurrency_acquire("lf:cc:t:u:r", 2, 1, 1, 0).await.unwrap();
        assert!(a4.allowed);
    }

    #[tokio::test]
    async fn concurrency_release_never_goes_negative() {
        let backend = MemoryCounterBackend::new();
        let n = backend.concurrency_release("lf:cc:t:u:missing", 3).await.unwrap();
        assert_eq!(n, 0);
    }
}
