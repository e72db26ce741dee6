//! The cache handle and its policy state machine.

use parking_lot::Mutex;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::{CacheEntry, CacheResult, FileStatus, Policy, RefreshStats, Snapshot};
use crate::trigger::{self, RefreshLoop, TriggerKind};

/// Platform file handle returned by [`CachedFile::current_descriptor`].
#[cfg(unix)]
pub type RawDescriptor = std::os::unix::io::RawFd;

/// Platform file handle returned by [`CachedFile::current_descriptor`].
#[cfg(windows)]
pub type RawDescriptor = std::os::windows::io::RawHandle;

/// Construction options for [`CachedFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Staleness policy
    pub policy: Policy,
    /// Allow OS change notification for [`Policy::Up2Date`].
    ///
    /// When `false`, `Up2Date` behaves like [`Policy::LazyUp2Date`].
    pub watch: bool,
}

impl CacheOptions {
    /// Options for `policy` with change notification enabled.
    #[must_use]
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            watch: true,
        }
    }

    /// Enable or disable change notification.
    #[must_use]
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}

/// A memory-mapped view of one file, kept fresh according to a [`Policy`].
///
/// All entry state sits behind one mutex, so reads, manual updates and
/// background refreshes never run a refresh concurrently. The handle is
/// `Send + Sync` and can be shared through an `Arc`.
///
/// Dropping the handle cancels the trigger, stops the refresh loop, and
/// closes the descriptor. Snapshots returned by [`read`](Self::read)
/// remain valid afterwards.
pub struct CachedFile {
    entry: Arc<Mutex<CacheEntry>>,
    path: PathBuf,
    policy: Policy,
    watching: bool,
    refresh_loop: Option<RefreshLoop>,
}

impl CachedFile {
    /// Open `path` under `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenFailed`](super::CacheError::OpenFailed) or
    /// [`StatFailed`](super::CacheError::StatFailed) if the file cannot be
    /// opened, [`InvalidPolicy`](super::CacheError::InvalidPolicy) for a zero
    /// interval, and [`Trigger`](super::CacheError::Trigger) if the interval
    /// timer cannot be started.
    pub fn open(path: impl AsRef<Path>, policy: Policy) -> CacheResult<Self> {
        Self::with_options(path, CacheOptions::new(policy))
    }

    /// Open `path` with explicit options.
    ///
    /// A change-notification watch that cannot be installed is not an
    /// error: the handle falls back to refreshing before every read.
    ///
    /// # Errors
    ///
    /// See [`CachedFile::open`].
    pub fn with_options(path: impl AsRef<Path>, options: CacheOptions) -> CacheResult<Self> {
        let policy = options.policy;
        let entry = CacheEntry::open(path.as_ref(), policy)?;
        let path = entry.path().to_path_buf();
        let entry = Arc::new(Mutex::new(entry));

        let refresh_loop = match policy.trigger_kind() {
            None => None,
            Some(TriggerKind::Watch) if !options.watch => {
                log::debug!(
                    "Change notification disabled, {} refreshes on read",
                    path.display()
                );
                None
            }
            Some(kind @ TriggerKind::Watch) => match start_trigger(&entry, &path, kind) {
                Ok(refresh_loop) => Some(refresh_loop),
                Err(e) => {
                    log::warn!("{}; falling back to refresh on read", e);
                    None
                }
            },
            Some(kind @ TriggerKind::Timer(_)) => Some(start_trigger(&entry, &path, kind)?),
        };

        let watching = policy == Policy::Up2Date && refresh_loop.is_some();

        Ok(Self {
            entry,
            path,
            policy,
            watching,
            refresh_loop,
        })
    }

    /// Return the cached contents, refreshing first if the policy says so.
    ///
    /// | Policy | Behavior |
    /// |---|---|
    /// | `NoReserve` | always `None` |
    /// | `OldCopy` | current snapshot; the refresh runs after it is taken |
    /// | `Up2Date` | current snapshot; refreshes first if not watching or the last refresh failed |
    /// | `LazyUp2Date` | refreshes, then returns the snapshot |
    /// | `Interval` | current snapshot |
    ///
    /// Never fails. `None` also means the file could not be mapped.
    pub fn read(&self) -> Option<Snapshot> {
        let mut entry = self.entry.lock();

        match self.policy {
            Policy::NoReserve => None,
            Policy::OldCopy => {
                let current = entry.mapping();
                refresh_absorbing(&mut entry);
                current
            }
            Policy::Up2Date if self.watching && !entry.is_degraded() => entry.mapping(),
            Policy::Up2Date | Policy::LazyUp2Date => {
                refresh_absorbing(&mut entry);
                entry.mapping()
            }
            Policy::Interval(_) => entry.mapping(),
        }
    }

    /// Force a synchronous refresh, whatever the policy.
    ///
    /// Failures are logged and kept in [`last_error`](Self::last_error);
    /// the previous state stays in place.
    pub fn update(&self) {
        refresh_absorbing(&mut self.entry.lock());
    }

    /// The raw descriptor currently held.
    ///
    /// The value is only meaningful until the next refresh that reopens the
    /// file; use [`try_clone_descriptor`](Self::try_clone_descriptor) to
    /// keep an independent handle.
    #[must_use]
    pub fn current_descriptor(&self) -> RawDescriptor {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            self.entry.lock().descriptor().as_raw_fd()
        }
        #[cfg(windows)]
        {
            use std::os::windows::io::AsRawHandle;
            self.entry.lock().descriptor().as_raw_handle()
        }
    }

    /// Duplicate the current descriptor.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the descriptor cannot be duplicated.
    pub fn try_clone_descriptor(&self) -> io::Result<File> {
        self.entry.lock().descriptor().try_clone()
    }

    /// The cached path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The policy fixed at construction.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Time of the last successful refresh.
    #[must_use]
    pub fn last_updated(&self) -> SystemTime {
        self.entry.lock().last_updated()
    }

    /// Whether OS change notification is keeping this handle fresh.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Most recent absorbed refresh failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.entry.lock().last_error().map(str::to_owned)
    }

    /// Refresh counters.
    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        self.entry.lock().stats()
    }

    /// Status recorded at the last successful refresh.
    #[must_use]
    pub fn status(&self) -> FileStatus {
        self.entry.lock().status()
    }
}

impl Drop for CachedFile {
    fn drop(&mut self) {
        // Cancel outside the lock; the refresh loop may be waiting on it
        let trigger = self.entry.lock().take_trigger();
        drop(trigger);

        if let Some(mut refresh_loop) = self.refresh_loop.take() {
            refresh_loop.shutdown();
        }
        log::trace!("Closed cache for {}", self.path.display());
    }
}

impl std::fmt::Debug for CachedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFile")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .field("watching", &self.watching)
            .finish_non_exhaustive()
    }
}

/// Spawn the refresh loop and bind a trigger of `kind` to it.
fn start_trigger(
    entry: &Arc<Mutex<CacheEntry>>,
    path: &Path,
    kind: TriggerKind,
) -> CacheResult<RefreshLoop> {
    let weak = Arc::downgrade(entry);
    let refresh_loop = RefreshLoop::spawn(move |reason| {
        let Some(entry) = weak.upgrade() else {
            return false;
        };
        let mut entry = entry.lock();
        log::trace!("{:?} refresh of {}", reason, entry.path().display());
        refresh_absorbing(&mut entry);
        true
    })?;

    let trigger = trigger::install(kind, path, refresh_loop.sender())?;
    entry.lock().set_trigger(trigger);
    Ok(refresh_loop)
}

fn refresh_absorbing(entry: &mut CacheEntry) {
    if let Err(e) = entry.refresh() {
        log::warn!("{}; keeping previous contents", e);
    }
}
