//! Change-notification trigger backed by `notify`.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use super::{RefreshReason, RefreshSender, Trigger, TriggerError, TriggerKind};

/// Requests a refresh whenever the OS reports a change to the watched file.
///
/// Backends such as inotify watch the file object the path resolved to at
/// install time, so the watch is re-installed every time the cache reopens
/// the path.
pub struct WatchTrigger {
    watcher: RecommendedWatcher,
    path: PathBuf,
    notifier: RefreshSender,
}

impl WatchTrigger {
    /// Watch `path` for modification, creation and removal events.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Watch`] if the platform watcher cannot be
    /// created or refuses the path.
    pub fn start(path: &Path, notifier: RefreshSender) -> Result<Self, TriggerError> {
        let watcher = watch(path, notifier.clone())?;
        log::debug!("Watching {} for changes", path.display());

        Ok(Self {
            watcher,
            path: path.to_path_buf(),
            notifier,
        })
    }

    /// The watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Trigger for WatchTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Watch
    }

    fn rebind(&mut self, path: &Path) -> Result<(), TriggerError> {
        let replacement = watch(path, self.notifier.clone())?;
        // Dropping the old watcher cancels it
        self.watcher = replacement;
        self.path = path.to_path_buf();
        log::trace!("Re-installed watch on {}", path.display());
        Ok(())
    }
}

fn watch(path: &Path, notifier: RefreshSender) -> Result<RecommendedWatcher, TriggerError> {
    let watched = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_change(&event.kind) => {
            log::trace!("Change event on {}: {:?}", watched.display(), event.kind);
            notifier.request(RefreshReason::FileChanged);
        }
        Ok(_) => {}
        Err(e) => log::warn!("Change notification error for {}: {}", watched.display(), e),
    })
    .map_err(|source| TriggerError::Watch {
        path: path.to_path_buf(),
        source,
    })?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(|source| TriggerError::Watch {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(watcher)
}

/// Content writes, attribute/link-count changes, and path replacement all
/// count. Plain accesses do not, so the cache's own reopen stays silent.
fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::RefreshLoop;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_is_change() {
        assert!(is_change(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_change(&EventKind::Create(CreateKind::File)));
        assert!(is_change(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_change(&EventKind::Access(AccessKind::Any)));
        assert!(!is_change(&EventKind::Any));
    }

    #[test]
    fn test_watch_missing_path_fails() {
        let dir = tempdir().unwrap();
        let refresh_loop = RefreshLoop::spawn(|_| true).unwrap();

        let result = WatchTrigger::start(&dir.path().join("missing"), refresh_loop.sender());
        assert!(matches!(result, Err(TriggerError::Watch { .. })));
    }

    #[test]
    fn test_watch_rebind_updates_path() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        fs::write(&first, b"1").unwrap();
        fs::write(&second, b"2").unwrap();

        let refresh_loop = RefreshLoop::spawn(|_| true).unwrap();
        // Platforms without a usable watcher are covered by the cache fallback
        let Ok(mut trigger) = WatchTrigger::start(&first, refresh_loop.sender()) else {
            return;
        };

        assert_eq!(trigger.path(), first.as_path());
        trigger.rebind(&second).unwrap();
        assert_eq!(trigger.path(), second.as_path());
        assert_eq!(trigger.kind(), TriggerKind::Watch);
    }
}
