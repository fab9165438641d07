//! Content fingerprinting.
//!
//! Filesystem notifications fire for touches, attribute changes, and
//! editors rewriting identical bytes. Only a different MD5 fingerprint
//! counts as a change.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

/// Outcome of checking a notified file.
#[derive(Debug, PartialEq, Eq)]
pub enum Change {
    /// Same bytes as the last known fingerprint.
    Unchanged,
    /// New bytes, decoded as UTF-8 (lossy).
    Changed(String),
}

/// Last-known fingerprint per file.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    fingerprints: HashMap<PathBuf, String>,
}

/// Hex-encoded MD5 of a byte slice.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

impl ChangeDetector {
    /// Create an empty detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current fingerprint of a file without reporting a change.
    pub fn seed(&mut self, path: &Path) -> io::Result<()> {
        let bytes = std::fs::read(path)?;
        self.fingerprints
            .insert(path.to_path_buf(), fingerprint(&bytes));
        Ok(())
    }

    /// Read a file and compare it with its last fingerprint.
    ///
    /// On a read error nothing is recorded, so the next successful read is
    /// compared against the previous fingerprint.
    pub fn detect(&mut self, path: &Path) -> io::Result<Change> {
        let bytes = std::fs::read(path)?;
        let current = fingerprint(&bytes);

        if self.fingerprints.get(path) == Some(&current) {
            return Ok(Change::Unchanged);
        }

        self.fingerprints.insert(path.to_path_buf(), current);
        Ok(Change::Changed(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Last recorded fingerprint of a file.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&str> {
        self.fingerprints.get(path).map(String::as_str)
    }
}
