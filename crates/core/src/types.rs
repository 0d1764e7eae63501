use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// The four rate-limit algorithms a [`Plan`] can select.
///
/// `Unknown` absorbs any value persisted in the policy store that does not
/// match one of the four known algorithms (e.g. written directly against the
/// database, or by a newer version of this service). The decision engine
/// treats `Unknown` the same as `TokenBucket` per its parameter-fallback
/// rules, rather than refusing to serve the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    TokenBucket,
    FixedWindow,
    SlidingWindow,
    Concurrency,
    #[serde(other)]
    Unknown,
}

impl Algorithm {
    /// The canonical string form used in keys, decisions, and the `algorithm`
    /// column of the policy store.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenBucket | Self::Unknown => "token_bucket",
            Self::FixedWindow => "fixed_window",
            Self::SlidingWindow => "sliding_window",
            Self::Concurrency => "concurrency",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator used in [`ResourcePolicy`] lookup: what kind of entity is
/// being rate-limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    ApiKey,
    Ip,
    UserId,
}

impl SubjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Ip => "ip",
            Self::UserId => "user_id",
        }
    }
}

impl std::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant owning plans, policies and API keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A named limit specification owned by a tenant.
///
/// Algorithm parameters are all optional; which ones are required depends on
/// `algorithm` (see [`Plan::validate`]). The decision engine resolves the
/// actual values used at check-time via its own fallback rules (plan fields
/// may be absent even for the algorithm that nominally needs them).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub algorithm: Algorithm,
    pub limit_per_window: Option<i64>,
    pub window_seconds: Option<i64>,
    pub bucket_capacity: Option<i64>,
    pub refill_rate_per_sec: Option<f64>,
    pub concurrency_limit: Option<i64>,
    #[serde(default = "default_cost_per_call")]
    pub cost_per_call: i64,
    #[serde(default = "default_burst_factor")]
    pub burst_factor: f64,
    pub created_at: DateTime<Utc>,
}

fn default_cost_per_call() -> i64 {
    1
}

fn default_burst_factor() -> f64 {
    1.0
}

impl Plan {
    /// Validate the plan's parameters against the invariants in the design
    /// (§3). Called on admin creation; the engine itself never rejects a
    /// stored plan, it only applies fallbacks (§4.4).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPlan`] describing the first violated
    /// invariant.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.algorithm {
            Algorithm::TokenBucket | Algorithm::Unknown => {
                let has_capacity = self.bucket_capacity.is_some_and(|c| c > 0);
                let has_limit = self.limit_per_window.is_some_and(|l| l > 0);
                if !has_capacity && !has_limit {
                    return Err(CoreError::InvalidPlan(
                        "token_bucket requires bucket_capacity > 0 or limit_per_window > 0".into(),
                    ));
                }
                if self.refill_rate_per_sec.is_some_and(|r| r < 0.0) {
                    return Err(CoreError::InvalidPlan(
                        "refill_rate_per_sec must be >= 0".into(),
                    ));
                }
            }
            Algorithm::FixedWindow | Algorithm::SlidingWindow => {
                if !self.limit_per_window.is_some_and(|l| l > 0) {
                    return Err(CoreError::InvalidPlan(
                        "fixed_window/sliding_window require limit_per_window > 0".into(),
                    ));
                }
                if self.window_seconds.is_some_and(|w| w <= 0) {
                    return Err(CoreError::InvalidPlan(
                        "window_seconds must be > 0 when set".into(),
                    ));
                }
            }
            Algorithm::Concurrency => {
                if !self.concurrency_limit.is_some_and(|c| c >= 1) {
                    return Err(CoreError::InvalidPlan(
                        "concurrency requires concurrency_limit >= 1".into(),
                    ));
                }
                if self.window_seconds.is_some_and(|w| w <= 0) {
                    return Err(CoreError::InvalidPlan(
                        "window_seconds must be > 0 when set".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Maps `(tenant_id, resource, subject_type)` to the plan that applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub resource: String,
    pub subject_type: SubjectType,
    pub plan_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An API key, consumed by external auth. The core only ever reads
/// `tenant_id` off an authenticated key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Per-call verdict and quota metadata. Not persisted; computed fresh for
/// every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: i64,
    pub limit: i64,
    pub reset_at: i64,
    pub retry_after_ms: i64,
    pub algorithm: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Decision {
    /// Populate the standard quota headers (§6) from this decision's fields.
    pub fn with_standard_headers(mut self) -> Self {
        self.headers
            .insert("X-RateLimit-Limit".to_owned(), self.limit.to_string());
        self.headers.insert(
            "X-RateLimit-Remaining".to_owned(),
            self.remaining.to_string(),
        );
        self.headers
            .insert("X-RateLimit-Reset".to_owned(), self.reset_at.to_string());
        let retry_after_s = self.retry_after_ms.div_ceil(1000).max(0);
        self.headers
            .insert("Retry-After".to_owned(), retry_after_s.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_plan(algorithm: Algorithm) -> Plan {
        Plan {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            name: "test".into(),
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

    #[test]
    fn token_bucket_requires_capacity_or_limit() {
        let plan = base_plan(Algorithm::TokenBucket);
        assert!(plan.validate().is_err());

        let plan = Plan {
            bucket_capacity: Some(10),
            ..base_plan(Algorithm::TokenBucket)
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn concurrency_requires_limit_at_least_one() {
        let plan = base_plan(Algorithm::Concurrency);
        assert!(plan.validate().is_err());

        let plan = Plan {
            concurrency_limit: Some(1),
            ..base_plan(Algorithm::Concurrency)
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn decision_headers_round_retry_after_up_to_seconds() {
        let decision = Decision {
            allowed: false,
            remaining: 0,
            limit: 2,
            reset_at: 1_000,
            retry_after_ms: 250,
            algorithm: "fixed_window".into(),
            headers: HashMap::new(),
        }
        .with_standard_headers();

        assert_eq!(decision.headers["Retry-After"], "1");
        assert_eq!(decision.headers["X-RateLimit-Limit"], "2");
    }

    #[test]
    fn unknown_algorithm_deserializes_without_error() {
        let alg: Algorithm = serde_json::from_str("\"some_future_algorithm\"").unwrap();
        assert_eq!(alg, Algorithm::Unknown);
        assert_eq!(alg.as_str(), "token_bucket");
    }
}
