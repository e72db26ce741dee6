//! Cache entries and the refresh protocol.
//!
//! A [`CacheEntry`] owns everything the cache knows about one file: the
//! open descriptor, the status observed at the last successful refresh,
//! the current mapping and an optional trigger. [`CacheEntry::refresh`] is
//! the only method that replaces any of them.

use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{CacheError, CacheResult, FileStatus, Policy, Snapshot};
use crate::trigger::{Trigger, TriggerKind};

/// Result of a successful [`CacheEntry::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The file is unchanged; nothing was reopened.
    Unchanged,
    /// The descriptor was replaced and, if the policy maps, remapped.
    Reloaded,
    /// The descriptor was replaced but the new mapping failed.
    /// The entry now holds no mapping.
    Degraded,
}

/// Counters describing the refresh history of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    /// Staleness checks performed
    pub checks: u64,
    /// Descriptors replaced
    pub reopens: u64,
    /// Mappings created, including the initial one
    pub remaps: u64,
    /// Refreshes that failed or degraded
    pub failures: u64,
}

/// The owned record of one cached file.
pub struct CacheEntry {
    path: PathBuf,
    policy: Policy,
    descriptor: File,
    last_status: FileStatus,
    mapping: Option<Snapshot>,
    last_updated: SystemTime,
    trigger: Option<Box<dyn Trigger>>,
    last_error: Option<String>,
    degraded: bool,
    stats: RefreshStats,
}

impl CacheEntry {
    /// Open `path` and, unless the policy is [`Policy::NoReserve`], map it.
    ///
    /// A failed initial mapping leaves the entry without a mapping rather
    /// than failing construction.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OpenFailed`] or [`CacheError::StatFailed`] if
    /// the file cannot be opened, and [`CacheError::InvalidPolicy`] for an
    /// unusable policy.
    pub fn open(path: impl Into<PathBuf>, policy: Policy) -> CacheResult<Self> {
        policy.validate()?;

        let path = path.into();
        let descriptor = open_descriptor(&path)?;
        let last_status = stat_descriptor(&path, &descriptor)?;

        let mut entry = Self {
            path,
            policy,
            descriptor,
            last_status,
            mapping: None,
            last_updated: SystemTime::now(),
            trigger: None,
            last_error: None,
            degraded: false,
            stats: RefreshStats::default(),
        };

        if policy.maps() {
            entry.degraded = !entry.remap();
        }

        log::debug!(
            "Opened {} ({} bytes, policy {})",
            entry.path.display(),
            entry.last_status.len,
            policy
        );
        Ok(entry)
    }

    /// Bring the entry in line with the file on disk.
    ///
    /// 1. Stat the current descriptor. A stat failure counts as a change.
    /// 2. If the status matches the recorded one, return
    ///    [`RefreshOutcome::Unchanged`].
    /// 3. Open and stat a new descriptor. On failure nothing is touched.
    /// 4. Swap it in, closing the old descriptor, and record its status.
    /// 5. Re-bind the trigger, if any.
    /// 6. Remap unless the policy is [`Policy::NoReserve`]. A map failure
    ///    leaves the entry unmapped and yields [`RefreshOutcome::Degraded`].
    /// 7. Record the update time.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OpenFailed`] or [`CacheError::StatFailed`] if
    /// the replacement descriptor cannot be acquired. The previous
    /// descriptor and mapping remain valid in that case.
    pub fn refresh(&mut self) -> CacheResult<RefreshOutcome> {
        self.stats.checks += 1;

        match FileStatus::of(&self.descriptor) {
            Ok(status) if status == self.last_status => {
                log::trace!("{} unchanged", self.path.display());
                return Ok(RefreshOutcome::Unchanged);
            }
            Ok(status) => log::debug!(
                "{} changed ({} -> {} bytes), reopening",
                self.path.display(),
                self.last_status.len,
                status.len
            ),
            Err(e) => log::debug!(
                "Stat of current descriptor for {} failed ({}), reopening",
                self.path.display(),
                e
            ),
        }

        let (descriptor, status) = match self.acquire() {
            Ok(acquired) => acquired,
            Err(e) => {
                self.record_failure(&e);
                return Err(e);
            }
        };

        // Old descriptor closes here, only after its replacement is ready
        drop(std::mem::replace(&mut self.descriptor, descriptor));
        self.last_status = status;
        self.stats.reopens += 1;
        self.last_error = None;

        let mut rebound = true;
        if let Some(trigger) = self.trigger.as_mut() {
            if let Err(e) = trigger.rebind(&self.path) {
                log::warn!("Failed to re-install trigger: {}", e);
                self.last_error = Some(e.to_string());
                rebound = false;
            }
        }

        // A dead trigger keeps the entry degraded so reads refresh inline
        let outcome = if !self.policy.maps() || self.remap() {
            self.degraded = !rebound;
            RefreshOutcome::Reloaded
        } else {
            self.degraded = true;
            self.stats.failures += 1;
            RefreshOutcome::Degraded
        };

        self.last_updated = SystemTime::now();
        Ok(outcome)
    }

    fn acquire(&self) -> CacheResult<(File, FileStatus)> {
        let descriptor = open_descriptor(&self.path)?;
        let status = stat_descriptor(&self.path, &descriptor)?;
        Ok((descriptor, status))
    }

    /// Replace the mapping with one of the current descriptor.
    /// Returns `false` (and clears the mapping) if mapping failed.
    fn remap(&mut self) -> bool {
        match Snapshot::map(&self.descriptor, self.last_status) {
            Ok(snapshot) => {
                self.mapping = Some(snapshot);
                self.stats.remaps += 1;
                true
            }
            Err(source) => {
                let err = CacheError::MapFailed {
                    path: self.path.clone(),
                    source,
                };
                log::warn!("{}", err);
                self.mapping = None;
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    fn record_failure(&mut self, err: &CacheError) {
        self.stats.failures += 1;
        self.degraded = true;
        self.last_error = Some(err.to_string());
    }

    /// Attach a trigger, replacing (and cancelling) any previous one.
    pub fn set_trigger(&mut self, trigger: Box<dyn Trigger>) {
        self.trigger = Some(trigger);
    }

    /// Detach the trigger so the caller can cancel it outside the lock.
    pub fn take_trigger(&mut self) -> Option<Box<dyn Trigger>> {
        self.trigger.take()
    }

    /// Kind of the installed trigger, if any.
    #[must_use]
    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        self.trigger.as_ref().map(|trigger| trigger.kind())
    }

    /// The source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The policy fixed at construction.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// The current descriptor. Replaced by the next reloading refresh.
    #[must_use]
    pub fn descriptor(&self) -> &File {
        &self.descriptor
    }

    /// Status recorded at the last successful refresh.
    #[must_use]
    pub fn status(&self) -> FileStatus {
        self.last_status
    }

    /// The current mapping, if any.
    #[must_use]
    pub fn mapping(&self) -> Option<Snapshot> {
        self.mapping.clone()
    }

    /// Time of the last successful refresh (or of construction).
    #[must_use]
    pub fn last_updated(&self) -> SystemTime {
        self.last_updated
    }

    /// Message of the most recent absorbed failure, cleared by the next
    /// successful reopen.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the last refresh attempt failed or left the entry unmapped.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Refresh counters.
    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        self.stats
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .field("last_status", &self.last_status)
            .field("mapping", &self.mapping)
            .field("trigger", &self.trigger_kind())
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

fn open_descriptor(path: &Path) -> CacheResult<File> {
    File::open(path).map_err(|source| CacheError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn stat_descriptor(path: &Path, descriptor: &File) -> CacheResult<FileStatus> {
    FileStatus::of(descriptor).map_err(|source| CacheError::StatFailed {
        path: path.to_path_buf(),
        source,
    })
}
