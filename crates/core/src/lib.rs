//! Shared types, key derivation and API-key hashing for the LimitForge
//! rate-limit decision service.
//!
//! This crate has no I/O of its own: it defines the data model (§3 of the
//! design), the key-derivation scheme (§4.1), and the HMAC-based API-key
//! hashing contract (§6). Storage and HTTP concerns live in the sibling
//! `limitforge-state*`, `limitforge-policy`, `limitforge-engine` and
//! `limitforge-server` crates.

pub mod error;
pub mod hashing;
pub mod key;
pub mod types;

pub use error::CoreError;
pub use hashing::{constant_time_eq, hash_api_key};
pub use key::derive_key;
pub use types::{
    Algorithm, ApiKey, Decision, Plan, ResourcePolicy, SubjectType, Tenant,
};
