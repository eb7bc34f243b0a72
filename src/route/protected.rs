use std::sync::Arc;

use crate::route::gate::{GateDecision, GateShared};
use crate::route::RouteGate;
use crate::storage::keys;

/// Lighter wrapper for individual pages: verify and, on failure, stash the
/// path and move to the in-app login route. No locale work, no tolerance.
#[derive(Clone)]
pub struct ProtectedRoute {
    shared: Arc<GateShared>,
}

impl ProtectedRoute {
    pub fn new(gate: &RouteGate) -> Self {
        Self { shared: gate.shared() }
    }

    pub async fn check(&self, path: &str) -> GateDecision {
        let shared = &self.shared;
        match shared.guard.verify_identity().await {
            Ok(_) => GateDecision::Render,
            Err(err) => {
                tracing::info!("Protected route {} rejected: {}", path, err);
                if path != shared.config.default_landing {
                    shared.storage.set(keys::REDIRECT_AFTER_LOGIN, path);
                }
                let to = shared.config.login_route.clone();
                shared.navigator.navigate(&to);
                GateDecision::RedirectedInApp { to }
            }
        }
    }
}
