use thiserror::Error;

use limitforge_state::StateError;

/// Errors the decision engine surfaces to its caller (spec.md §7).
///
/// The engine performs no recovery: a store-communication failure is
/// always fatal, never a silent allow or block (§4.2 "Failure semantics").
/// Plan resolution happens before `DecisionEngine::check` is called (the
/// caller passes an already-resolved `Plan`), so the engine itself has only
/// one failure mode.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The counter store failed or timed out (§7 `upstream_unavailable`).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<StateError> for EngineError {
    fn from(e: StateError) -> Self {
        Self::UpstreamUnavailable(e.to_string())
    }
}
