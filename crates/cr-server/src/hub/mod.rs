//! Session hub.
//!
//! The [`Hub`] owns every piece of server-side state: connected sessions,
//! per-file subscriber sets, and content fingerprints. It runs on a single
//! dedicated thread and processes [`HubCommand`]s one at a time, so
//! subscription changes and fan-out never interleave.
//!
//! ```text
//! WebSocket tasks ──Connect/Request/Disconnect──┐
//!                                               ├──► Hub thread ──► per-session senders
//! FileWatcher ────────────FileChanged───────────┘
//! ```

mod debouncer;
mod detector;
mod registry;
mod watcher;
pub(crate) mod websocket;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use cr_protocol::{ClientRequest, ServerEvent};
use tokio::sync::mpsc;
use uuid::Uuid;

pub use detector::{Change, ChangeDetector, fingerprint};
pub use registry::SubscriptionRegistry;
pub(crate) use watcher::FileWatcher;

/// Command processed by the hub thread.
#[derive(Debug)]
pub enum HubCommand {
    /// A session connected. Events for it go to `sender`.
    Connect {
        /// Session identifier.
        session: Uuid,
        /// Outbound channel to the session's socket.
        sender: mpsc::UnboundedSender<ServerEvent>,
    },
    /// A session sent a request.
    Request {
        /// Session identifier.
        session: Uuid,
        /// Decoded request.
        request: ClientRequest,
    },
    /// A session's socket closed.
    Disconnect {
        /// Session identifier.
        session: Uuid,
    },
    /// A watched file was created or modified on disk.
    FileChanged(PathBuf),
}

/// Server-side state: sessions, subscriptions, fingerprints.
#[derive(Debug)]
pub struct Hub {
    base_dir: PathBuf,
    sentinel: Option<PathBuf>,
    sessions: HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>,
    registry: SubscriptionRegistry,
    detector: ChangeDetector,
}

impl Hub {
    /// Create a hub serving files under `base_dir`.
    ///
    /// A change to `sentinel` (the agent script, in debug mode) reloads every
    /// connected page instead of pushing content.
    #[must_use]
    pub fn new(base_dir: PathBuf, sentinel: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            sentinel,
            sessions: HashMap::new(),
            registry: SubscriptionRegistry::new(),
            detector: ChangeDetector::new(),
        }
    }

    /// Subscriptions, for inspection.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Number of connected sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Process one command to completion.
    pub fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { session, sender } => self.connect(session, sender),
            HubCommand::Request { session, request } => self.request(session, request),
            HubCommand::Disconnect { session } => self.disconnect(session),
            HubCommand::FileChanged(path) => self.file_changed(&path),
        }
    }

    /// Move the hub onto its own thread.
    ///
    /// The thread exits once every [`HubHandle`] is dropped.
    pub fn spawn(mut self) -> std::io::Result<HubHandle> {
        let (tx, mut rx) = mpsc::unbounded_channel::<HubCommand>();

        std::thread::Builder::new()
            .name("cr-hub".to_owned())
            .spawn(move || {
                while let Some(command) = rx.blocking_recv() {
                    self.handle(command);
                }
                tracing::debug!("Hub stopped");
            })?;

        Ok(HubHandle { tx })
    }

    /// Map a client path (`/css/a.css`) to a file under the base directory.
    ///
    /// `..` segments clamp at the base directory.
    #[must_use]
    pub fn resolve(&self, client_path: &str) -> PathBuf {
        let mut resolved = self.base_dir.clone();
        let mut depth = 0usize;

        for segment in client_path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if depth > 0 {
                        resolved.pop();
                        depth -= 1;
                    }
                }
                _ => {
                    resolved.push(segment);
                    depth += 1;
                }
            }
        }

        resolved
    }

    /// Map a file under the base directory back to its client path.
    #[must_use]
    pub fn client_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_dir).ok()?;
        let mut client = String::new();
        for component in relative.components() {
            let Component::Normal(segment) = component else {
                return None;
            };
            client.push('/');
            client.push_str(&segment.to_string_lossy());
        }
        if client.is_empty() {
            client.push('/');
        }
        Some(client)
    }

    fn connect(&mut self, session: Uuid, sender: mpsc::UnboundedSender<ServerEvent>) {
        tracing::info!(session = %session, "Session connected");
        self.sessions.insert(session, sender);
        self.send(
            session,
            ServerEvent::Connected {
                session_id: session.to_string(),
            },
        );
    }

    fn disconnect(&mut self, session: Uuid) {
        self.sessions.remove(&session);
        let files = self.registry.disconnect(session);
        tracing::info!(session = %session, files, "Session disconnected");
    }

    fn request(&mut self, session: Uuid, request: ClientRequest) {
        let path = self.resolve(request.path());

        match request {
            ClientRequest::AddFile { path: client, load } => {
                if self.registry.subscribe(&path, session)
                    && let Err(e) = self.detector.seed(&path)
                {
                    tracing::debug!(path = %path.display(), error = %e, "Could not fingerprint file");
                }
                tracing::debug!(session = %session, path = %client, "Started watching");

                if load {
                    self.push_current(session, &path);
                }
            }
            ClientRequest::RemoveFile { path: client } => {
                self.registry.unsubscribe(&path, session);
                tracing::debug!(session = %session, path = %client, "Stopped watching");
            }
        }
    }

    /// Send a file's current content to one session.
    fn push_current(&mut self, session: Uuid, path: &Path) {
        let Some(client) = self.client_path(path) else {
            return;
        };
        match std::fs::read(path) {
            Ok(bytes) => self.send(
                session,
                ServerEvent::FileChanged {
                    path: client,
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                },
            ),
            Err(e) => {
                tracing::info!(path = %client, error = %e, "Could not read requested file");
            }
        }
    }

    fn file_changed(&mut self, path: &Path) {
        let is_sentinel = self.sentinel.as_deref() == Some(path);
        if !is_sentinel && !self.registry.is_watched(path) {
            tracing::debug!(path = %path.display(), "No subscribers, change ignored");
            return;
        }

        let content = match self.detector.detect(path) {
            Ok(Change::Changed(content)) => content,
            Ok(Change::Unchanged) => {
                tracing::debug!(path = %path.display(), "Notified of a change, but fingerprint is the same");
                return;
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not read changed file");
                return;
            }
        };

        if is_sentinel {
            tracing::info!(path = %path.display(), "Agent script changed, reloading pages");
            let sessions: Vec<Uuid> = self.sessions.keys().copied().collect();
            for session in sessions {
                self.send(session, ServerEvent::ReloadPage);
            }
            return;
        }

        let Some(client) = self.client_path(path) else {
            return;
        };
        tracing::info!(path = %client, "File changed");

        let subscribers: Vec<Uuid> = self.registry.subscribers(path).collect();
        for session in subscribers {
            self.send(
                session,
                ServerEvent::FileChanged {
                    path: client.clone(),
                    content: content.clone(),
                },
            );
        }
    }

    /// Deliver an event to one session. Failures only affect that session.
    fn send(&self, session: Uuid, event: ServerEvent) {
        let Some(sender) = self.sessions.get(&session) else {
            tracing::debug!(session = %session, "Session is gone, event dropped");
            return;
        };
        if sender.send(event).is_err() {
            tracing::debug!(session = %session, "Session channel closed, event dropped");
        }
    }
}

/// Cloneable handle to a running hub.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Queue a command. Returns `false` if the hub has stopped.
    pub fn send(&self, command: HubCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}
