//! Application State

use std::sync::Arc;

use product_advisor::Orchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Turn orchestrator with its sessions, cache and tools
    pub advisor: Arc<Orchestrator>,
}
