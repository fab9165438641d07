//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::hub::websocket;
use crate::middleware::security;
use crate::state::AppState;
use crate::static_files;

/// WebSocket endpoint for agent sessions.
pub const WS_PATH: &str = "/cr/ws";

/// Agent script endpoint.
pub const AGENT_PATH: &str = "/cr/css-reload.js";

/// Agent WebAssembly module, fetched by the script's bootstrap.
pub const AGENT_MODULE_PATH: &str = "/cr/css-reload_bg.wasm";

/// Create the application router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(WS_PATH, get(websocket::ws_handler))
        .route(AGENT_PATH, get(static_files::serve_agent))
        .route(AGENT_MODULE_PATH, get(static_files::serve_agent_module))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(security::content_type_options_layer()),
        )
        .with_state(state)
}
