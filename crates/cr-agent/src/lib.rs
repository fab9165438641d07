//! Browser agent for css-reload.
//!
//! The agent replaces every same-origin `<link rel="stylesheet">` (and each
//! file it `@import`s) with a `<style>` insertion point holding the file's
//! CSS, then keeps those insertion points in sync with content pushed by
//! the server.
//!
//! The page is reached through the [`StyleDom`] trait, so the same logic
//! runs against a browser binding or the in-memory [`memory::MemoryDom`]
//! used in tests.
//!
//! # Example
//!
//! ```ignore
//! let mut session = AgentSession::new(dom, PathNormalizer::new(origin, "/index.html"));
//! session.handle_message(&frame);
//! for request in session.take_requests() {
//!     socket.send(serde_json::to_string(&request)?)?;
//! }
//! ```

mod dom;
mod graph;
mod normalize;
mod reconcile;
mod registry;
mod session;

#[cfg(any(test, feature = "mock"))]
pub mod memory;

pub use dom::{CssRule, Placement, StyleDom, StyleSheet};
pub use normalize::{PathNormalizer, is_local};
pub use reconcile::{Extracted, ImportDiff, diff_imports, extract};
pub use registry::{ImportDescriptor, StyleRegistry, TrackedFile};
pub use session::AgentSession;
