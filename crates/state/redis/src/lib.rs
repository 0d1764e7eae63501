//! Redis-backed [`CounterBackend`](limitforge_state::CounterBackend) for the
//! shared counter store (§6). Every algorithm primitive is a Lua script
//! (`scripts`) invoked through a `deadpool-redis` connection pool.

pub mod config;
pub mod scripts;
pub mod store;

pub use config::RedisConfig;
pub use store::RedisCounterBackend;
