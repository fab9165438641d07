//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;

use crate::hub::HubHandle;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Handle to the hub thread.
    pub(crate) hub: HubHandle,
    /// Agent loader served at `/cr/css-reload.js`.
    pub(crate) agent_script: PathBuf,
    /// Start the agent with debug logging.
    pub(crate) debug: bool,
}
