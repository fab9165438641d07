//! Per-file subscriber sets.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Maps watched files to the sessions interested in them.
///
/// A file is either unwatched (no entry) or watched (an entry, possibly with
/// no subscribers). Entries are never dropped once created.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    files: HashMap<PathBuf, BTreeSet<Uuid>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a session to a file.
    ///
    /// Returns `true` when this created the file's entry.
    pub fn subscribe(&mut self, path: &Path, session: Uuid) -> bool {
        let mut created = false;
        self.files
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                created = true;
                BTreeSet::new()
            })
            .insert(session);
        created
    }

    /// Unsubscribe a session from a file. The entry itself stays.
    pub fn unsubscribe(&mut self, path: &Path, session: Uuid) -> bool {
        self.files
            .get_mut(path)
            .is_some_and(|sessions| sessions.remove(&session))
    }

    /// Remove a session from every subscriber set.
    ///
    /// Returns the number of files it was subscribed to.
    pub fn disconnect(&mut self, session: Uuid) -> usize {
        self.files
            .values_mut()
            .map(|sessions| sessions.remove(&session))
            .filter(|removed| *removed)
            .count()
    }

    /// Whether a file has an entry.
    #[must_use]
    pub fn is_watched(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Sessions subscribed to a file.
    pub fn subscribers(&self, path: &Path) -> impl Iterator<Item = Uuid> + '_ {
        self.files.get(path).into_iter().flatten().copied()
    }

    /// Whether a session is subscribed to any file.
    #[must_use]
    pub fn has_session(&self, session: Uuid) -> bool {
        self.files.values().any(|sessions| sessions.contains(&session))
    }
}
