//! Agent session: event dispatch and outgoing requests.

use std::collections::HashSet;

use cr_protocol::{ClientRequest, ServerEvent};

use crate::dom::StyleDom;
use crate::normalize::PathNormalizer;
use crate::registry::StyleRegistry;

/// Browser-side state for one page.
///
/// Consumes [`ServerEvent`]s, keeps the page's insertion points in sync, and
/// queues [`ClientRequest`]s for the transport to drain with
/// [`take_requests`](Self::take_requests).
#[derive(Debug)]
pub struct AgentSession<D: StyleDom> {
    pub(crate) dom: D,
    pub(crate) normalizer: PathNormalizer,
    pub(crate) registry: StyleRegistry<D::Node>,
    pub(crate) outbox: Vec<ClientRequest>,
    /// Paths linked more than once that were already reported.
    pub(crate) duplicate_links: HashSet<String>,
    session_id: Option<String>,
    walked: bool,
}

impl<D: StyleDom> AgentSession<D> {
    /// Create a session over a document.
    pub fn new(dom: D, normalizer: PathNormalizer) -> Self {
        Self {
            dom,
            normalizer,
            registry: StyleRegistry::new(),
            outbox: Vec::new(),
            duplicate_links: HashSet::new(),
            session_id: None,
            walked: false,
        }
    }

    /// Document the session operates on.
    pub fn dom(&self) -> &D {
        &self.dom
    }

    /// Mutable document, for simulating page changes.
    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    /// Tracked files.
    pub fn registry(&self) -> &StyleRegistry<D::Node> {
        &self.registry
    }

    /// Normalizer used for every reference.
    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    /// Session id assigned by the server, once connected.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether the transport is up.
    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    /// Drain queued requests in the order they were produced.
    pub fn take_requests(&mut self) -> Vec<ClientRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Dispatch a server event.
    pub fn handle(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { session_id } => self.connected(&session_id),
            ServerEvent::FileChanged { path, content } => self.file_changed(&path, &content),
            ServerEvent::ReloadPage => {
                tracing::info!("Reloading page");
                self.dom.reload();
            }
        }
    }

    /// Decode and dispatch a JSON text frame.
    ///
    /// Frames that are not a known event are logged and dropped.
    pub fn handle_message(&mut self, text: &str) {
        match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => self.handle(event),
            Err(e) => tracing::debug!(error = %e, "Ignoring unknown message"),
        }
    }

    /// Transport established.
    ///
    /// Walks the document on first connect, then subscribes to every
    /// tracked file. On reconnect the existing subscriptions are replayed.
    pub fn connected(&mut self, session_id: &str) {
        tracing::info!(session_id = %session_id, "Connected");
        self.session_id = Some(session_id.to_owned());

        if !self.walked {
            self.walk_document();
            self.walked = true;
        }

        let requests: Vec<ClientRequest> = self.registry.paths().map(ClientRequest::add).collect();
        self.outbox.extend(requests);
    }

    /// Transport lost. Queued requests are dropped; they are replayed on
    /// the next [`connected`](Self::connected).
    pub fn disconnected(&mut self) {
        tracing::info!("Disconnected");
        self.session_id = None;
        self.outbox.clear();
    }

    /// Rescan the document for stylesheets added after page load.
    ///
    /// Newly found files are subscribed when connected.
    pub fn refresh(&mut self) {
        let registered = self.walk_document();
        self.walked = true;
        if self.is_connected() {
            self.outbox
                .extend(registered.into_iter().map(ClientRequest::add));
        }
    }

    fn file_changed(&mut self, path: &str, raw: &str) {
        let path = self.normalizer.normalize(path, None);
        let Some(css) = self.reconcile(&path, raw) else {
            return;
        };
        self.registry.set_content(&mut self.dom, &path, &css);
        tracing::debug!(path = %path, "Updated stylesheet");
    }
}
