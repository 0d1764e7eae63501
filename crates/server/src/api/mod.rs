//! Axum router wiring for the LimitForge HTTP surface (spec.md §6).

pub mod admin;
pub mod check;
pub mod health;
pub mod metrics;
pub mod schemas;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{require_admin_token, require_api_key};
use crate::config::LimitForgeConfig;
use crate::state::AppState;

/// Build the Axum router with every route from spec.md §6.
///
/// `/v1/check` is gated by `X-API-Key` (§7 `missing_api_key`/
/// `invalid_api_key`); every `/v1/admin/*` route is gated by
/// `Authorization: Bearer <admin-token>` (§7 `missing_admin_token`/
/// `invalid_admin_token`). `/v1/health` and `/metrics` are unauthenticated.
pub fn router(state: AppState, config: &LimitForgeConfig) -> Router {
    let data_plane = Router::new()
        .route("/v1/check", post(check::check))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let control_plane = Router::new()
        .route("/v1/admin/tenants", post(admin::create_tenant))
        .route("/v1/admin/plans", post(admin::create_plan))
        .route("/v1/admin/keys", post(admin::create_api_key))
        .route("/v1/admin/policies", post(admin::create_resource_policy))
        .route(
            "/v1/admin/tenants/{id}/summary",
            get(admin::tenant_summary),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    let public = Router::new()
        .route("/v1/health", get(health::health))
        .route("/metrics", get(metrics::metrics));

    let cors = if config.is_dev() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .merge(data_plane)
        .merge(control_plane)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
