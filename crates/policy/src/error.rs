use thiserror::Error;

/// Errors raised by a [`crate::PolicyStore`] implementation or the
/// [`crate::resolver::PlanResolver`] built on top of it.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Could not obtain a connection to the policy store.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected the query (constraint violation, malformed row).
    #[error("query error: {0}")]
    Query(String),

    /// Resolution found no matching plan (spec.md §4.3 `plan_not_found`).
    #[error("plan not found")]
    PlanNotFound,
}
