//! Immutable views of cached file contents.

use memmap2::{Mmap, MmapMut};
use std::fmt;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::sync::Arc;
use std::time::SystemTime;

use super::status::FileStatus;

/// A read-only copy of the file as it was at one refresh.
///
/// Cloning is cheap (an `Arc` bump). A snapshot stays valid after the
/// cache installs a newer one; its region is unmapped when the last clone
/// is dropped.
///
/// The bytes live in an anonymous mapping filled from the descriptor, so
/// later writes to the file (in place, truncating or shrinking) never show
/// through an existing snapshot.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<Backing>,
    status: FileStatus,
    taken: SystemTime,
}

enum Backing {
    Mapped(Mmap),
    // mmap(2) rejects zero-length mappings
    Empty,
}

impl Snapshot {
    /// Copy `status.len` bytes of `file` into a fresh read-only mapping.
    ///
    /// Reads are positional, so the descriptor's offset is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the size does not fit in the address space, the
    /// OS refuses the mapping, or the file is shorter than `status.len`
    /// by the time it is read.
    pub fn map(file: &File, status: FileStatus) -> io::Result<Self> {
        let len = usize::try_from(status.len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("file of {} bytes does not fit in memory", status.len),
            )
        })?;

        let backing = if len == 0 {
            Backing::Empty
        } else {
            let mut map = MmapMut::map_anon(len)?;
            read_exact_at(file, &mut map, 0)?;
            Backing::Mapped(map.make_read_only()?)
        };

        Ok(Self {
            inner: Arc::new(backing),
            status,
            taken: SystemTime::now(),
        })
    }

    /// Status of the file the snapshot was mapped from.
    #[must_use]
    pub fn status(&self) -> FileStatus {
        self.status
    }

    /// When the mapping was created.
    #[must_use]
    pub fn taken(&self) -> SystemTime {
        self.taken
    }

    /// Whether two snapshots share the same mapping.
    #[must_use]
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Deref for Snapshot {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self.inner.as_ref() {
            Backing::Mapped(map) => map,
            Backing::Empty => &[],
        }
    }
}

impl AsRef<[u8]> for Snapshot {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.len())
            .field("taken", &self.taken)
            .finish()
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file shrank while being read",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
