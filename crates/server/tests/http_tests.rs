//! End-to-end HTTP tests against the in-memory policy store and counter
//! backend (SPEC_FULL.md §8: "Tests exercise the in-memory counter backend
//! and policy store so they do not require a live Postgres/Redis instance").

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::json;

use limitforge_engine::DecisionEngine;
use limitforge_policy::MemoryPolicyStore;
use limitforge_server::config::LimitForgeConfig;
use limitforge_server::AppState;
use limitforge_state_memory::MemoryCounterBackend;

const ADMIN_TOKEN: &str = "test-admin-token";

fn test_server() -> TestServer {
    let state = AppState {
        engine: Arc::new(DecisionEngine::new(Arc::new(MemoryCounterBackend::new()))),
        policy: Arc::new(MemoryPolicyStore::new()),
        admin_bearer_token: Arc::from(ADMIN_TOKEN),
        apikey_hash_salt: Arc::from("test-salt"),
        version: Arc::from("test"),
    };
    let config = LimitForgeConfig::load("/nonexistent/limitforge.toml").unwrap();
    let app = limitforge_server::api::router(state, &config);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let server = test_server();
    let response = server.get("/v1/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn check_without_api_key_is_unauthorized() {
    let server = test_server();
    let response = server
        .post("/v1/check")
        .json(&json!({ "resource": "GET:/demo", "subject": "u:1" }))
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn check_with_unknown_api_key_is_forbidden() {
    let server = test_server();
    let response = server
        .post("/v1/check")
        .add_header("X-API-Key", "lfk_does_not_exist")
        .json(&json!({ "resource": "GET:/demo", "subject": "u:1" }))
        .await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_routes_require_bearer_token() {
    let server = test_server();
    let response = server
        .post("/v1/admin/tenants")
        .json(&json!({ "name": "acme" }))
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);

    let response = server
        .post("/v1/admin/tenants")
        .add_header("Authorization", "Bearer wrong-token")
        .json(&json!({ "name": "acme" }))
        .await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);
}

/// Full provisioning flow: create a tenant, a fixed-window plan with a
/// limit of 2, a policy binding the two to a resource, and an API key —
/// then drive `/v1/check` until the third call is blocked (spec.md §8
/// scenario 1).
#[tokio::test]
async fn fixed_window_plan_blocks_third_call_end_to_end() {
    let server = test_server();

    let tenant: serde_json::Value = server
        .post("/v1/admin/tenants")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({ "name": "acme" }))
        .await
        .json();
    let tenant_id = tenant["id"].as_str().unwrap();

    let plan: serde_json::Value = server
        .post("/v1/admin/plans")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({
            "tenant_id": tenant_id,
            "name": "two-per-minute",
            "algorithm": "fixed_window",
            "limit_per_window": 2,
            "window_seconds": 60
        }))
        .await
        .json();
    let plan_id = plan["id"].as_str().unwrap();

    server
        .post("/v1/admin/policies")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({
            "tenant_id": tenant_id,
            "resource": "GET:/demo",
            "subject_type": "api_key",
            "plan_id": plan_id
        }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let key: serde_json::Value = server
        .post("/v1/admin/keys")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({ "tenant_id": tenant_id, "name": "ci" }))
        .await
        .json();
    let raw_key = key["raw_key"].as_str().unwrap();

    let check_once = || {
        server
            .post("/v1/check")
            .add_header("X-API-Key", raw_key)
            .json(&json!({ "resource": "GET:/demo", "subject": "u:1" }))
    };

    let first = check_once().await;
    first.assert_status_ok();
    let second = check_once().await;
    second.assert_status_ok();
    let third = check_once().await;
    third.assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        third.header("X-RateLimit-Remaining").to_str().unwrap(),
        "0"
    );

    let summary: serde_json::Value = server
        .get(&format!("/v1/admin/tenants/{tenant_id}/summary"))
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .await
        .json();
    assert_eq!(summary["plan_count"], 1);
    assert_eq!(summary["policy_count"], 1);
    assert_eq!(summary["api_key_count"], 1);
}

#[tokio::test]
async fn check_with_no_matching_policy_returns_not_found() {
    let server = test_server();

    let tenant: serde_json::Value = server
        .post("/v1/admin/tenants")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({ "name": "acme" }))
        .await
        .json();
    let tenant_id = tenant["id"].as_str().unwrap();

    let key: serde_json::Value = server
        .post("/v1/admin/keys")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({ "tenant_id": tenant_id, "name": "ci" }))
        .await
        .json();
    let raw_key = key["raw_key"].as_str().unwrap();

    let response = server
        .post("/v1/check")
        .add_header("X-API-Key", raw_key)
        .json(&json!({ "resource": "GET:/unbound", "subject": "u:1" }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_plan_parameters_are_rejected_on_creation() {
    let server = test_server();

    let tenant: serde_json::Value = server
        .post("/v1/admin/tenants")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({ "name": "acme" }))
        .await
        .json();
    let tenant_id = tenant["id"].as_str().unwrap();

    let response = server
        .post("/v1/admin/plans")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({
            "tenant_id": tenant_id,
            "name": "broken",
            "algorithm": "concurrency",
            "concurrency_limit": 0
        }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn explicit_plan_id_bypasses_tenant_resource_binding() {
    let server = test_server();

    let tenant: serde_json::Value = server
        .post("/v1/admin/tenants")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({ "name": "acme" }))
        .await
        .json();
    let tenant_id = tenant["id"].as_str().unwrap();

    let plan: serde_json::Value = server
        .post("/v1/admin/plans")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({
            "tenant_id": tenant_id,
            "name": "unbound-plan",
            "algorithm": "token_bucket",
            "bucket_capacity": 5
        }))
        .await
        .json();
    let plan_id = plan["id"].as_str().unwrap();

    let key: serde_json::Value = server
        .post("/v1/admin/keys")
        .add_header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
        .json(&json!({ "tenant_id": tenant_id, "name": "ci" }))
        .await
        .json();
    let raw_key = key["raw_key"].as_str().unwrap();

    let response = server
        .post("/v1/check")
        .add_header("X-API-Key", raw_key)
        .json(&json!({
            "resource": "GET:/no-policy-bound-here",
            "subject": "u:1",
            "plan_id": plan_id
        }))
        .await;
    response.assert_status_ok();
}
