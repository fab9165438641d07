//! Live CSS reload server.
//!
//! Watches a directory of stylesheets and pushes changed content to the
//! browser agents subscribed to each file:
//! - `GET /cr/ws` - WebSocket endpoint for agent sessions
//! - `GET /cr/css-reload.js` - the agent script
//! - `GET /cr/css-reload_bg.wasm` - the agent's WebAssembly module
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use cr_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         base_dir: PathBuf::from("public"),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser agent ──WebSocket──► session task ──┐
//!                                             ├──► Hub thread (subscriptions + fingerprints)
//! notify ──► debouncer ──► FileWatcher ───────┘            │
//!                                                          └──► fileChanged / reloadPage
//! ```

mod app;
mod error;
mod hub;
mod middleware;
mod state;
mod static_files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use app::{AGENT_MODULE_PATH, AGENT_PATH, WS_PATH};
pub use error::ServerError;
pub use hub::{
    Change, ChangeDetector, Hub, HubCommand, HubHandle, SubscriptionRegistry, fingerprint,
};

use hub::FileWatcher;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory whose stylesheets are served under `/`.
    pub base_dir: PathBuf,
    /// Glob patterns of watched files, relative to `base_dir`.
    pub patterns: Vec<String>,
    /// Debounce window for filesystem events.
    pub debounce: Duration,
    /// Agent loader served at [`AGENT_PATH`], with its module next to it.
    pub agent_script: PathBuf,
    /// Reload pages when the agent script changes.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7980,
            base_dir: PathBuf::from("."),
            patterns: vec!["**/*.css".to_owned()],
            debounce: Duration::from_millis(100),
            agent_script: PathBuf::from("client/css-reload.js"),
            debug: false,
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the base directory is missing, the watcher cannot be
/// set up, or the listener cannot bind.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    // notify reports canonical paths
    let base_dir = std::fs::canonicalize(&config.base_dir)?;

    let sentinel = if config.debug {
        match std::fs::canonicalize(&config.agent_script) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(
                    path = %config.agent_script.display(),
                    error = %e,
                    "Agent script not found, page reload on change disabled"
                );
                None
            }
        }
    } else {
        None
    };

    let hub = Hub::new(base_dir.clone(), sentinel.clone()).spawn()?;
    let _watcher = FileWatcher::start(
        &base_dir,
        &config.patterns,
        sentinel.as_deref(),
        config.debounce,
        hub.clone(),
    )?;

    let state = Arc::new(AppState {
        hub,
        agent_script: config.agent_script.clone(),
        debug: config.debug,
    });
    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, base_dir = %base_dir.display(), "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from loaded configuration.
#[must_use]
pub fn server_config_from_config(config: &cr_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        base_dir: config.watch_resolved.base_dir.clone(),
        patterns: config.watch_resolved.patterns.clone(),
        debounce: config.watch_resolved.debounce(),
        agent_script: config.agent_resolved.script.clone(),
        debug: config.agent_resolved.debug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_config_from_default_config() {
        let config = cr_config::Config::default();
        let server = server_config_from_config(&config);

        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 7980);
        assert_eq!(server.patterns, vec!["**/*.css"]);
        assert_eq!(server.debounce, Duration::from_millis(100));
        assert!(!server.debug);
    }
}
