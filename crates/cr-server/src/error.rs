//! Server error type.

/// Error starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket or filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File watcher could not be set up.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
    /// Host and port do not form a socket address.
    #[error("Invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),
}
