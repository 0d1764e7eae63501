use std::time::Duration;

/// Configuration for the Redis counter-store backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`).
    ///
    /// Use `rediss://` scheme for TLS connections. When `tls_enabled` is set,
    /// the URL scheme is automatically upgraded to `rediss://`.
    pub url: String,

    /// Key prefix applied to every shared-store key. The spec's key shapes
    /// (§4.1, e.g. `lf:tb:...`) already carry a `lf:` namespace; this prefix
    /// is prepended ahead of that for multi-deployment isolation (e.g.
    /// sharing one Redis instance across staging/prod).
    pub prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,

    /// Whether TLS is enabled. When `true`, a `redis://` URL is automatically
    /// upgraded to `rediss://`.
    pub tls_enabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::new(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
            tls_enabled: false,
        }
    }
}

impl RedisConfig {
    /// Return the effective connection URL, upgrading to `rediss://` when TLS
    /// is enabled.
    pub fn effective_url(&self) -> String {
        if self.tls_enabled && self.url.starts_with("redis://") {
            self.url.replacen("redis://", "rediss://", 1)
        } else {
            self.url.clone()
        }
    }

    /// Prepend the configured prefix to a shared-store key.
    pub fn render_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = RedisConfig::default();
        assert_eq!(cfg.url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.pool_size, 10);
        assert_eq!(cfg.connection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn tls_upgrades_scheme() {
        let cfg = RedisConfig {
            tls_enabled: true,
            ..RedisConfig::default()
        };
        assert_eq!(cfg.effective_url(), "rediss://127.0.0.1:6379");
    }

    #[test]
    fn prefix_is_prepended() {
        let cfg = RedisConfig {
            prefix: "staging".into(),
            ..RedisConfig::default()
        };
        assert_eq!(cfg.render_key("lf:tb:t1:u1:r1"), "staging:lf:tb:t1:u1:r1");
    }
}
