//! Wire protocol for css-reload.
//!
//! Messages travel as JSON text frames over the `/cr/ws` WebSocket, tagged
//! by a `type` field:
//!
//! ```text
//! server ──► agent   {"type":"connected","sessionId":"…"}
//!                    {"type":"fileChanged","path":"/css/a.css","content":"…"}
//!                    {"type":"reloadPage"}
//!
//! agent  ──► server  {"type":"addFile","path":"/css/a.css","load":false}
//!                    {"type":"removeFile","path":"/css/a.css"}
//! ```
//!
//! Paths are canonical, origin-relative paths (always starting with `/`).

use serde::{Deserialize, Serialize};

/// Event pushed from the server to a browser session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Session established. The agent walks the document and subscribes.
    #[serde(rename_all = "camelCase")]
    Connected {
        /// Transport-assigned session identifier.
        session_id: String,
    },
    /// Full replacement text for a watched file, before import extraction.
    FileChanged {
        /// Canonical path of the file.
        path: String,
        /// Raw file content.
        content: String,
    },
    /// Reload the whole page.
    ReloadPage,
}

/// Request sent from a browser session to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Subscribe to changes of a file. Idempotent.
    AddFile {
        /// Canonical path of the file.
        path: String,
        /// Ask the server to push the current content right away.
        ///
        /// Set for imports discovered after page load, whose content the
        /// page never fetched.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        load: bool,
    },
    /// Unsubscribe from a file. Idempotent.
    RemoveFile {
        /// Canonical path of the file.
        path: String,
    },
}

impl ClientRequest {
    /// Subscribe without requesting the current content.
    #[must_use]
    pub fn add(path: impl Into<String>) -> Self {
        Self::AddFile {
            path: path.into(),
            load: false,
        }
    }

    /// Subscribe and request the current content.
    #[must_use]
    pub fn add_and_load(path: impl Into<String>) -> Self {
        Self::AddFile {
            path: path.into(),
            load: true,
        }
    }

    /// Unsubscribe.
    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self::RemoveFile { path: path.into() }
    }

    /// Path the request refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::AddFile { path, .. } | Self::RemoveFile { path } => path,
        }
    }

    /// Encode as a JSON text frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl ServerEvent {
    /// Encode as a JSON text frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Serializing a string-keyed enum of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
