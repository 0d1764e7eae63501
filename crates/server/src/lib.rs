//! HTTP layer for the LimitForge multi-tenant rate-limit decision service
//! (spec.md §6): axum routes, request/admin auth, configuration loading and
//! telemetry initialization. The decision logic itself lives in
//! `limitforge-engine`/`limitforge-policy`/`limitforge-state*`; this crate
//! only adapts it to the wire.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;

pub use state::AppState;
