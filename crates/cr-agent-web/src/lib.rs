//! Browser binding of the css-reload agent.
//!
//! Runs [`cr_agent::AgentSession`] inside the page: [`WebDom`] implements
//! [`cr_agent::StyleDom`] over `document`, and the transport connects it to
//! the server's `/cr/ws` socket and rescans the document every second.
//!
//! # Building
//!
//! ```text
//! wasm-pack build crates/cr-agent-web --release --target no-modules \
//!     --out-dir ../../client --out-name css-reload
//! ```
//!
//! This writes `client/css-reload.js` and `client/css-reload_bg.wasm`, the
//! default agent location. The server appends a bootstrap to the script
//! that loads the module and calls [`start`].

mod dom;
mod transport;

use cr_agent::{AgentSession, PathNormalizer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_wasm::{WASMLayer, WASMLayerConfigBuilder};
use wasm_bindgen::prelude::*;

pub use dom::WebDom;

use transport::Agent;

/// Start the agent against the server socket at `ws_url`.
///
/// # Errors
///
/// Returns an error if there is no window or document, or the socket or
/// refresh timer cannot be set up.
#[wasm_bindgen]
pub fn start(ws_url: &str, debug: bool) -> Result<(), JsValue> {
    init_logging(debug);

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let location = window.location();
    let normalizer = PathNormalizer::new(location.origin()?, &location.pathname()?);

    let agent = Agent::shared(AgentSession::new(WebDom::new(document), normalizer), ws_url);
    transport::connect(&agent, &window)?;
    transport::start_refresh(&agent, &window)?;

    tracing::info!(url = %ws_url, "Agent started");
    Ok(())
}

/// Route `tracing` to the browser console.
fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let config = WASMLayerConfigBuilder::new()
        .set_max_level(level)
        .set_report_logs_in_timings(false)
        .build();
    let subscriber = tracing_subscriber::registry().with(WASMLayer::new(config));
    // Already set when the script is included twice.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
