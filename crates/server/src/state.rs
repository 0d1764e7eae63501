use std::sync::Arc;

use limitforge_engine::DecisionEngine;
use limitforge_policy::PolicyStore;

/// Shared application state handed to every HTTP handler (§9 "Global engine
/// singleton": one instance per process, constructed at startup).
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub policy: Arc<dyn PolicyStore>,
    pub admin_bearer_token: Arc<str>,
    pub apikey_hash_salt: Arc<str>,
    pub version: Arc<str>,
}
