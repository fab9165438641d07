//! Agent asset serving.
//!
//! The agent is a `wasm-bindgen` build: a loader script plus a
//! `<name>_bg.wasm` module next to it. Both are read from disk on every
//! request so a rebuild is picked up without restarting.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Appended to the loader. Resolves the module and socket next to the
/// script's own URL, so the page may live on another origin.
const BOOTSTRAP: &str = r#"
;(function (debug) {
  var script = document.currentScript;
  var base = new URL(script ? "." : "/cr/", script ? script.src : location.href);
  var socket = new URL("ws", base);
  socket.protocol = socket.protocol === "https:" ? "wss:" : "ws:";
  wasm_bindgen({ module_or_path: new URL("css-reload_bg.wasm", base) })
    .then(function () { wasm_bindgen.start(socket.href, debug); })
    .catch(function (e) { console.error("css-reload: agent failed to start", e); });
})(__CR_DEBUG__);
"#;

/// Loader script with the bootstrap for the given mode.
pub(crate) fn bootstrap(debug: bool) -> String {
    BOOTSTRAP.replace("__CR_DEBUG__", if debug { "true" } else { "false" })
}

/// WebAssembly module generated next to the loader script.
pub(crate) fn module_path(script: &Path) -> PathBuf {
    let stem = script
        .file_stem()
        .map_or_else(|| "css-reload".into(), |s| s.to_string_lossy());
    script.with_file_name(format!("{stem}_bg.wasm"))
}

/// Serve the agent loader followed by its bootstrap.
pub(crate) async fn serve_agent(State(state): State<Arc<AppState>>) -> Response {
    match tokio::fs::read(&state.agent_script).await {
        Ok(mut content) => {
            content.extend_from_slice(bootstrap(state.debug).as_bytes());
            (
                [
                    (header::CONTENT_TYPE, "text/javascript; charset=utf-8"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                Body::from(content),
            )
                .into_response()
        }
        Err(e) => {
            tracing::debug!(
                path = %state.agent_script.display(),
                error = %e,
                "Agent script not available"
            );
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Serve the agent's WebAssembly module.
///
/// The page fetches it from its own origin, so it is marked readable
/// cross-origin.
pub(crate) async fn serve_agent_module(State(state): State<Arc<AppState>>) -> Response {
    let path = module_path(&state.agent_script);
    match tokio::fs::read(&path).await {
        Ok(content) => (
            [
                (header::CONTENT_TYPE, "application/wasm"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            Body::from(content),
        )
            .into_response(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Agent module not available");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
