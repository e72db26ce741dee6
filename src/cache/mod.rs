//! Memory-mapped file cache.
//!
//! This module keeps a single file mapped into memory and refreshes the
//! mapping according to a [`Policy`].
//!
//! # Architecture
//!
//! The cache is split into a leaf and a façade:
//!
//! * [`entry`]: Owns the descriptor, the status snapshot and the mapping.
//!   [`CacheEntry::refresh`] is the only code that reopens or remaps.
//! * [`handle`]: [`CachedFile`] wraps an entry behind a mutex and decides,
//!   per policy, when a refresh runs relative to reads.
//!
//! Supporting types live in [`policy`], [`status`] and [`snapshot`].
//!
//! # Staleness
//!
//! An entry is considered stale when the status of its current descriptor
//! differs from the status recorded at the last successful refresh:
//! * File size
//! * Modification time (mtime)
//! * Inode, device, link count and ctime (on Unix)
//!
//! # Example
//!
//! ```no_run
//! use mapcache::cache::{CachedFile, Policy};
//!
//! let cache = CachedFile::open("/etc/hosts", Policy::LazyUp2Date)?;
//! if let Some(bytes) = cache.read() {
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok::<(), mapcache::cache::CacheError>(())
//! ```

pub mod entry;
pub mod handle;
pub mod policy;
pub mod snapshot;
pub mod status;

use std::path::PathBuf;

pub use entry::{CacheEntry, RefreshOutcome, RefreshStats};
pub use handle::{CacheOptions, CachedFile, RawDescriptor};
pub use policy::Policy;
pub use snapshot::Snapshot;
pub use status::FileStatus;

/// Errors produced by the cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The path could not be opened.
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        /// Path that failed to open
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The status of a freshly opened descriptor could not be read.
    #[error("Failed to stat {path}: {source}")]
    StatFailed {
        /// Path that failed to stat
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be mapped into memory.
    #[error("Failed to map {path}: {source}")]
    MapFailed {
        /// Path that failed to map
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A policy string or value was rejected.
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// A required invalidation trigger could not be started.
    #[error(transparent)]
    Trigger(#[from] crate::trigger::TriggerError),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
