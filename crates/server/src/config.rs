//! Server configuration: an optional TOML file plus environment-variable
//! overrides for the secrets and DSNs spec.md §6 calls out. Mirrors the
//! teacher's TOML-plus-env pattern (`acteon-server::config::ActeonConfig`),
//! trimmed to the options this service actually recognizes.

use serde::Deserialize;

/// Top-level configuration for the LimitForge server, loaded from an
/// optional TOML file and overridden by environment variables.
#[derive(Debug, Deserialize)]
pub struct LimitForgeConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub store: StoreSection,
}

/// HTTP bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

/// Deployment environment and auth/hashing secrets (§6 "Environment
/// configuration"). Values here are overridden by env vars in
/// [`LimitForgeConfig::load`]; the TOML file is meant for the non-secret
/// defaults, matching the teacher's split between `acteon.toml` and
/// environment-sourced credentials.
#[derive(Debug, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub admin_bearer_token: String,
    #[serde(default)]
    pub apikey_hash_salt: String,
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            env: default_env(),
            version: default_version(),
            log_level: default_log_level(),
            admin_bearer_token: String::new(),
            apikey_hash_salt: String::new(),
            otel_exporter_otlp_endpoint: None,
        }
    }
}

fn default_env() -> String {
    "dev".to_owned()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Backing-store connection configuration.
#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    pub postgres_dsn: Option<String>,
    pub redis_url: Option<String>,
}

impl LimitForgeConfig {
    /// Load the TOML file at `path` if it exists (falling back to defaults),
    /// then apply the environment-variable overrides named in §6.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is not valid TOML for this
    /// shape.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config: Self = if std::path::Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            toml::from_str("")?
        };

        if let Ok(v) = std::env::var("APP_ENV") {
            config.app.env = v;
        }
        if let Ok(v) = std::env::var("APP_VERSION") {
            config.app.version = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.app.log_level = v;
        }
        if let Ok(v) = std::env::var("ADMIN_BEARER_TOKEN") {
            config.app.admin_bearer_token = v;
        }
        if let Ok(v) = std::env::var("APIKEY_HASH_SALT") {
            config.app.apikey_hash_salt = v;
        }
        if let Ok(v) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.app.otel_exporter_otlp_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("POSTGRES_DSN") {
            config.store.postgres_dsn = Some(v);
        }
        if let Ok(v) = std::env::var("REDIS_URL") {
            config.store.redis_url = Some(v);
        }

        Ok(config)
    }

    /// `true` when `APP_ENV=dev` (§6: "dev enables permissive CORS").
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.app.env == "dev"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_absent() {
        let config = LimitForgeConfig::load("/nonexistent/limitforge.toml").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.app.env, "dev");
        assert!(config.is_dev());
    }

    #[test]
    fn dev_env_enables_permissive_cors_flag() {
        let config = LimitForgeConfig::load("/nonexistent/limitforge.toml").unwrap();
        assert!(config.is_dev());
    }
}
