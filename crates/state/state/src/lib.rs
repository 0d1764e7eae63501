//! Trait abstraction over the shared counter store (§4.2, §5, §6 "Shared
//! counter store"). Concrete backends live in sibling crates
//! (`limitforge-state-redis`, `limitforge-state-memory`); this crate only
//! defines the contract and the result/error types the engine depends on.

pub mod backend;
pub mod error;

pub use backend::{ConcurrencyResult, CounterBackend, PrimitiveResult};
pub use error::StateError;
