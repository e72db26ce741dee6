//! Invalidation triggers.
//!
//! A trigger is an asynchronous source of refresh requests bound to a
//! cached file. Two implementations exist:
//!
//! - [`watch::WatchTrigger`]: OS change notification via `notify`
//! - [`timer::TimerTrigger`]: a fixed-period ticker
//!
//! Triggers never touch cache state. They post requests through a
//! [`RefreshSender`] to the owning handle's [`RefreshLoop`], which is the
//! only thread that runs background refreshes.

pub mod event_loop;
pub mod timer;
pub mod watch;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use event_loop::{RefreshLoop, RefreshReason, RefreshSender};
pub use timer::TimerTrigger;
pub use watch::WatchTrigger;

/// Which proactive trigger a policy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Change notification on the cached path
    Watch,
    /// Periodic timer
    Timer(Duration),
}

/// An installed source of refresh requests.
pub trait Trigger: Send {
    /// The kind of this trigger.
    fn kind(&self) -> TriggerKind;

    /// Called after the cache switched to a new descriptor for `path`.
    ///
    /// Implementations bound to the old descriptor cancel themselves and
    /// re-install against the new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement could not be installed. The
    /// previous binding is kept in that case.
    fn rebind(&mut self, path: &Path) -> Result<(), TriggerError>;
}

/// Errors that can occur while installing a trigger.
#[derive(thiserror::Error, Debug)]
pub enum TriggerError {
    /// Change notification could not be set up for the path.
    #[error("Failed to watch {path}: {source}")]
    Watch {
        /// Path that could not be watched
        path: PathBuf,
        /// The underlying notify error
        #[source]
        source: notify::Error,
    },

    /// A background thread could not be started.
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        /// Name of the thread
        name: &'static str,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Install the trigger for `kind`, delivering requests through `notifier`.
///
/// # Errors
///
/// Returns an error if the platform cannot provide the trigger.
pub fn install(
    kind: TriggerKind,
    path: &Path,
    notifier: RefreshSender,
) -> Result<Box<dyn Trigger>, TriggerError> {
    match kind {
        TriggerKind::Watch => Ok(Box::new(WatchTrigger::start(path, notifier)?)),
        TriggerKind::Timer(period) => Ok(Box::new(TimerTrigger::start(period, notifier)?)),
    }
}
