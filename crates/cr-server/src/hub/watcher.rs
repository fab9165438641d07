//! Filesystem watcher feeding the hub.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::debouncer::{Debouncer, FsEventKind};
use super::{HubCommand, HubHandle};

/// How often the debouncer is drained.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Which paths are forwarded to the hub.
#[derive(Debug, Clone)]
struct PathFilter {
    base_dir: PathBuf,
    patterns: Vec<glob::Pattern>,
    sentinel: Option<PathBuf>,
}

impl PathFilter {
    fn matches(&self, path: &Path) -> bool {
        if self.sentinel.as_deref() == Some(path) {
            return true;
        }
        let Ok(relative) = path.strip_prefix(&self.base_dir) else {
            return false;
        };
        let relative = relative.to_string_lossy();
        self.patterns.iter().any(|p| p.matches(&relative))
    }
}

/// Watches the base directory and forwards created or modified files.
///
/// Dropping the watcher stops notifications.
pub(crate) struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Directory to watch recursively
    /// * `patterns` - Glob patterns relative to `base_dir` (e.g., `**/*.css`)
    /// * `sentinel` - Extra file to watch (the agent script in debug mode)
    /// * `debounce` - Quiet period before an event is forwarded
    /// * `hub` - Destination for [`HubCommand::FileChanged`]
    pub(crate) fn start(
        base_dir: &Path,
        patterns: &[String],
        sentinel: Option<&Path>,
        debounce: Duration,
        hub: HubHandle,
    ) -> Result<Self, notify::Error> {
        let filter = PathFilter {
            base_dir: base_dir.to_path_buf(),
            patterns: patterns
                .iter()
                .filter_map(|p| glob::Pattern::new(p).ok())
                .collect(),
            sentinel: sentinel.map(Path::to_path_buf),
        };

        let (tx, mut rx) = mpsc::channel::<Event>(100);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                // The callback runs on notify's own thread.
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        })?;

        watcher.watch(base_dir, RecursiveMode::Recursive)?;
        if let Some(sentinel) = sentinel
            && !sentinel.starts_with(base_dir)
            && let Some(parent) = sentinel.parent()
        {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        let debouncer = Arc::new(Debouncer::new(debounce));

        let recorder = Arc::clone(&debouncer);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                record_event(&event, &filter, &recorder);
            }
        });

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                for (path, kind) in debouncer.drain_ready(Instant::now()) {
                    if !kind.has_content() {
                        tracing::debug!(path = %path.display(), "File removed, ignored");
                        continue;
                    }
                    if !hub.send(HubCommand::FileChanged(path)) {
                        return;
                    }
                }
            }
        });

        Ok(Self { _watcher: watcher })
    }
}

/// Record a raw notify event into the debouncer.
fn record_event(event: &Event, filter: &PathFilter, debouncer: &Debouncer) {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Created,
        EventKind::Modify(_) => FsEventKind::Modified,
        EventKind::Remove(_) => FsEventKind::Removed,
        _ => return,
    };

    let now = Instant::now();
    for path in &event.paths {
        if !filter.matches(path) {
            continue;
        }
        debouncer.record(path.clone(), kind, now);
        tracing::trace!(path = %path.display(), ?kind, "Recorded filesystem event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    fn filter() -> PathFilter {
        PathFilter {
            base_dir: PathBuf::from("/site"),
            patterns: vec![glob::Pattern::new("**/*.css").unwrap()],
            sentinel: Some(PathBuf::from("/tools/css-reload.js")),
        }
    }

    #[test]
    fn test_filter_matches_css_under_base_dir() {
        let filter = filter();
        assert!(filter.matches(Path::new("/site/main.css")));
        assert!(filter.matches(Path::new("/site/css/theme/dark.css")));
        assert!(!filter.matches(Path::new("/site/index.html")));
        assert!(!filter.matches(Path::new("/other/main.css")));
    }

    #[test]
    fn test_filter_matches_sentinel_outside_base_dir() {
        let filter = filter();
        assert!(filter.matches(Path::new("/tools/css-reload.js")));
        assert!(!filter.matches(Path::new("/tools/other.js")));
    }

    #[test]
    fn test_record_event_filters_and_maps_kind() {
        let debouncer = Debouncer::new(Duration::ZERO);
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/a.css"))
            .add_path(PathBuf::from("/site/a.txt"));

        record_event(&event, &filter(), &debouncer);

        let ready = debouncer.drain_ready(Instant::now());
        assert_eq!(ready, vec![(PathBuf::from("/site/a.css"), FsEventKind::Created)]);
    }

    #[test]
    fn test_record_event_ignores_access() {
        let debouncer = Debouncer::new(Duration::ZERO);
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/site/a.css"));

        record_event(&event, &filter(), &debouncer);
        record_event(
            &Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/site/b.css")),
            &filter(),
            &debouncer,
        );

        let ready = debouncer.drain_ready(Instant::now());
        assert_eq!(ready, vec![(PathBuf::from("/site/b.css"), FsEventKind::Modified)]);
    }
}
