//! Key Deriver (§4.1): a pure, total function from `(algorithm, tenant,
//! subject, resource, [window])` to the shared-store key string. Stability of
//! these shapes matters across rolling deployments, so every component is
//! used verbatim — callers are responsible for normalizing tenant/subject/
//! resource strings before calling in.

use crate::types::Algorithm;

/// Derive the shared counter-store key for one algorithm invocation.
///
/// `window_seconds` is only consulted for `fixed_window`, to compute the
/// aligned window epoch; it is ignored for the other three algorithms.
pub fn derive_key(
    algorithm: Algorithm,
    tenant: &str,
    subject: &str,
    resource: &str,
    window_seconds: i64,
    now_sec: i64,
) -> String {
    match algorithm {
        Algorithm::TokenBucket | Algorithm::Unknown => {
            format!("lf:tb:{tenant}:{subject}:{resource}")
        }
        Algorithm::FixedWindow => {
            let window_epoch = window_epoch_sec(window_seconds, now_sec);
            format!("lf:fw:{tenant}:{subject}:{resource}:{window_epoch}")
        }
        Algorithm::SlidingWindow => format!("lf:sw:{tenant}:{subject}:{resource}"),
        Algorithm::Concurrency => format!("lf:cc:{tenant}:{subject}:{resource}"),
    }
}

/// `window_epoch_sec = floor(now_sec / window_seconds) * window_seconds`.
pub fn window_epoch_sec(window_seconds: i64, now_sec: i64) -> i64 {
    if window_seconds <= 0 {
        return now_sec;
    }
    (now_sec / window_seconds) * window_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_shape() {
        let k = derive_key(Algorithm::TokenBucket, "t1", "u1", "GET:/demo", 0, 0);
        assert_eq!(k, "lf:tb:t1:u1:GET:/demo");
    }

    #[test]
    fn fixed_window_shape_includes_epoch() {
        let k = derive_key(Algorithm::FixedWindow, "t1", "u1", "GET:/demo", 60, 125);
        assert_eq!(k, "lf:fw:t1:u1:GET:/demo:120");
    }

    #[test]
    fn sliding_window_shape() {
        let k = derive_key(Algorithm::SlidingWindow, "t1", "u1", "GET:/demo", 0, 0);
        assert_eq!(k, "lf:sw:t1:u1:GET:/demo");
    }

    #[test]
    fn concurrency_shape() {
        let k = derive_key(Algorithm::Concurrency, "t1", "u1", "GET:/demo", 0, 0);
        assert_eq!(k, "lf:cc:t1:u1:GET:/demo");
    }

    #[test]
    fn key_changes_iff_any_component_changes() {
        let base = derive_key(Algorithm::FixedWindow, "t1", "u1", "r1", 60, 100);
        assert_eq!(base, derive_key(Algorithm::FixedWindow, "t1", "u1", "r1", 60, 100));
        assert_ne!(base, derive_key(Algorithm::FixedWindow, "t2", "u1", "r1", 60, 100));
        assert_ne!(base, derive_key(Algorithm::FixedWindow, "t1", "u2", "r1", 60, 100));
        assert_ne!(base, derive_key(Algorithm::FixedWindow, "t1", "u1", "r2", 60, 100));
        assert_ne!(base, derive_key(Algorithm::FixedWindow, "t1", "u1", "r1", 60, 200));
    }
}
