//! File status snapshots used as the staleness oracle.

use std::fs::{File, Metadata};
use std::io;
use std::time::SystemTime;

/// Size and modification marker of a file at one point in time.
///
/// Two statuses compare equal only when every recorded attribute matches.
/// On Unix the inode identity and link count are included, so replacing
/// the path with a new file (rename over it) also reads as a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    /// File size in bytes
    pub len: u64,
    /// Last modification time, if the platform reports one
    pub modified: Option<SystemTime>,
    identity: Identity,
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Identity {
    dev: u64,
    ino: u64,
    nlink: u64,
    ctime: i64,
    ctime_nsec: i64,
}

#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Identity;

impl Identity {
    #[cfg(unix)]
    fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            nlink: meta.nlink(),
            ctime: meta.ctime(),
            ctime_nsec: meta.ctime_nsec(),
        }
    }

    #[cfg(not(unix))]
    fn from_metadata(_meta: &Metadata) -> Self {
        Self
    }
}

impl FileStatus {
    /// Query the status of an open descriptor.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the descriptor cannot be stat'ed.
    pub fn of(file: &File) -> io::Result<Self> {
        file.metadata().map(|meta| Self::from_metadata(&meta))
    }

    /// Build a status from already fetched metadata.
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
            identity: Identity::from_metadata(meta),
        }
    }

    /// Whether both statuses describe the same underlying file object.
    ///
    /// Always `true` on platforms without inode identity.
    #[must_use]
    pub fn same_file(&self, other: &FileStatus) -> bool {
        #[cfg(unix)]
        {
            self.identity.dev == other.identity.dev && self.identity.ino == other.identity.ino
        }
        #[cfg(not(unix))]
        {
            let _ = other;
            true
        }
    }
}
