use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`crate::CounterBackend`] implementation.
///
/// Every variant here is a fatal, surfaced-to-the-caller failure (§4.2
/// "Failure semantics"): the engine never maps a `StateError` to a silent
/// allow or block.
#[derive(Debug, Error)]
pub enum StateError {
    /// Could not obtain a connection to the backing store.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected the operation (script error, type mismatch in
    /// stored state, protocol error).
    #[error("backend error: {0}")]
    Backend(String),

    /// The operation did not complete within its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}
