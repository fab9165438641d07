//! Filesystem event coalescing.
//!
//! Editors emit bursts of events per save (truncate, write, chmod, or a
//! write-to-temp followed by a rename). The debouncer keeps one pending
//! event per path and releases it once the path has been quiet for the
//! debounce window.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Kind of filesystem event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FsEventKind {
    Created,
    Modified,
    Removed,
}

impl FsEventKind {
    /// Whether the file has content worth reading.
    pub(crate) fn has_content(self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }
}

#[derive(Debug)]
struct Pending {
    kind: FsEventKind,
    deadline: Instant,
}

/// Per-path event debouncer, shared between the notify callback side and
/// the draining task.
#[derive(Debug)]
pub(crate) struct Debouncer {
    window: Duration,
    pending: Mutex<HashMap<PathBuf, Pending>>,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Record an event observed at `now`, pushing the path's deadline back.
    pub(crate) fn record(&self, path: PathBuf, kind: FsEventKind, now: Instant) {
        let mut pending = self.lock();
        let deadline = now + self.window;

        let merged = match pending.get(&path) {
            Some(existing) => coalesce(existing.kind, kind),
            None => Some(kind),
        };

        match merged {
            Some(kind) => {
                pending.insert(path, Pending { kind, deadline });
            }
            None => {
                pending.remove(&path);
            }
        }
    }

    /// Take every event whose deadline is at or before `now`.
    pub(crate) fn drain_ready(&self, now: Instant) -> Vec<(PathBuf, FsEventKind)> {
        let mut pending = self.lock();
        let mut ready = Vec::new();

        pending.retain(|path, event| {
            if event.deadline <= now {
                ready.push((path.clone(), event.kind));
                false
            } else {
                true
            }
        });

        ready.sort_by(|a, b| a.0.cmp(&b.0));
        ready
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Pending>> {
        // A panic while holding the lock leaves the map usable.
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Merge a new event into a pending one. `None` drops both.
fn coalesce(existing: FsEventKind, new: FsEventKind) -> Option<FsEventKind> {
    use FsEventKind::{Created, Modified, Removed};

    match (existing, new) {
        // Appeared and vanished inside one window.
        (Created, Removed) => None,
        (Created, Created | Modified) => Some(Created),
        // Replaced by write-to-temp and rename.
        (Removed, Created) => Some(Modified),
        (Removed, Modified | Removed) | (Modified, Removed) => Some(Removed),
        (Modified, Created) => Some(Created),
        (Modified, Modified) => Some(Modified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn test_burst_becomes_one_event() {
        let debouncer = Debouncer::new(WINDOW);
        let start = Instant::now();
        let path = PathBuf::from("/site/a.css");

        for offset in [0, 20, 40] {
            debouncer.record(path.clone(), FsEventKind::Modified, start + Duration::from_millis(offset));
        }

        assert!(debouncer.drain_ready(start + Duration::from_millis(120)).is_empty());
        assert_eq!(
            debouncer.drain_ready(start + Duration::from_millis(140)),
            vec![(path, FsEventKind::Modified)]
        );
        assert!(debouncer.drain_ready(start + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_atomic_save_reads_as_modified() {
        let debouncer = Debouncer::new(WINDOW);
        let now = Instant::now();
        let path = PathBuf::from("/site/a.css");

        debouncer.record(path.clone(), FsEventKind::Removed, now);
        debouncer.record(path.clone(), FsEventKind::Created, now);

        let ready = debouncer.drain_ready(now + WINDOW);
        assert_eq!(ready, vec![(path, FsEventKind::Modified)]);
        assert!(ready[0].1.has_content());
    }

    #[test]
    fn test_short_lived_file_is_dropped() {
        let debouncer = Debouncer::new(WINDOW);
        let now = Instant::now();
        let path = PathBuf::from("/site/tmp.css");

        debouncer.record(path.clone(), FsEventKind::Created, now);
        debouncer.record(path, FsEventKind::Removed, now);

        assert!(debouncer.drain_ready(now + WINDOW).is_empty());
    }

    #[test]
    fn test_paths_are_independent() {
        let debouncer = Debouncer::new(WINDOW);
        let now = Instant::now();

        debouncer.record(PathBuf::from("/b.css"), FsEventKind::Created, now);
        debouncer.record(PathBuf::from("/a.css"), FsEventKind::Modified, now);

        assert_eq!(
            debouncer.drain_ready(now + WINDOW),
            vec![
                (PathBuf::from("/a.css"), FsEventKind::Modified),
                (PathBuf::from("/b.css"), FsEventKind::Created),
            ]
        );
    }

    #[test]
    fn test_coalesce_matrix() {
        use FsEventKind::{Created, Modified, Removed};

        assert_eq!(coalesce(Created, Created), Some(Created));
        assert_eq!(coalesce(Created, Modified), Some(Created));
        assert_eq!(coalesce(Created, Removed), None);
        assert_eq!(coalesce(Modified, Created), Some(Created));
        assert_eq!(coalesce(Modified, Modified), Some(Modified));
        assert_eq!(coalesce(Modified, Removed), Some(Removed));
        assert_eq!(coalesce(Removed, Created), Some(Modified));
        assert_eq!(coalesce(Removed, Modified), Some(Removed));
        assert_eq!(coalesce(Removed, Removed), Some(Removed));
        assert!(!Removed.has_content());
    }
}
