use thiserror::Error;

/// Errors raised by core type construction and validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A plan's algorithm parameters violate an invariant from the data model.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}
