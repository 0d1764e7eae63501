//! In-process [`CounterBackend`](limitforge_state::CounterBackend), for
//! tests and single-node deployments that do not need a shared external
//! store.

mod store;

pub use store::MemoryCounterBackend;
