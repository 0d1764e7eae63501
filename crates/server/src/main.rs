use std::sync::Arc;

use clap::Parser;
use tracing::info;

use limitforge_engine::DecisionEngine;
use limitforge_policy::{PolicyStore, PostgresConfig, PostgresPolicyStore};
use limitforge_server::config::LimitForgeConfig;
use limitforge_server::{telemetry, AppState};
use limitforge_state::CounterBackend;
use limitforge_state_memory::MemoryCounterBackend;

/// LimitForge rate-limit decision service.
#[derive(Parser, Debug)]
#[command(name = "limitforge-server", about = "Multi-tenant rate-limit decision service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "limitforge.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = LimitForgeConfig::load(&cli.config)?;
    let telemetry_guard = telemetry::init(&config.app);

    if config.app.admin_bearer_token.is_empty() {
        tracing::warn!(
            "ADMIN_BEARER_TOKEN is not set; every admin request will be rejected as invalid"
        );
    }
    if config.app.apikey_hash_salt.is_empty() {
        tracing::warn!(
            "APIKEY_HASH_SALT is not set; API-key hashing will use an empty pepper"
        );
    }

    let policy: Arc<dyn PolicyStore> = match config.store.postgres_dsn.as_deref() {
        Some(dsn) => {
            let pg_config = PostgresConfig {
                url: dsn.to_owned(),
                ..PostgresConfig::default()
            };
            let store = PostgresPolicyStore::connect(pg_config).await?;
            info!("policy store connected (postgres)");
            Arc::new(store)
        }
        None => {
            return Err("POSTGRES_DSN must be set (policy store has no in-memory backend)".into());
        }
    };

    let counters: Arc<dyn CounterBackend> = match config.store.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) => {
            let redis_config = limitforge_state_redis::RedisConfig {
                url: url.to_owned(),
                ..limitforge_state_redis::RedisConfig::default()
            };
            let backend = limitforge_state_redis::RedisCounterBackend::new(redis_config)?;
            info!("counter store connected (redis)");
            Arc::new(backend)
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            return Err("REDIS_URL was set but this binary was built without the redis feature".into());
        }
        None => {
            tracing::warn!(
                "REDIS_URL is not set; using the in-memory counter store (single-process only)"
            );
            Arc::new(MemoryCounterBackend::new())
        }
    };

    let engine = Arc::new(DecisionEngine::new(counters));

    let state = AppState {
        engine,
        policy,
        admin_bearer_token: Arc::from(config.app.admin_bearer_token.as_str()),
        apikey_hash_salt: Arc::from(config.app.apikey_hash_salt.as_str()),
        version: Arc::from(config.app.version.as_str()),
    };

    let app = limitforge_server::api::router(state, &config);

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "limitforge-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("limitforge-server shut down");
    telemetry_guard.shutdown();
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful
/// shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
