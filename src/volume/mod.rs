//! Volume information and fill-file allocation.
//!
//! The free-space fill loop only talks to a [`Volume`]: it samples free space
//! live, creates fill files and asks them to reserve a length. [`LocalVolume`] is
//! the real implementation backed by `statvfs(2)` and the kernel mount table.

pub mod local;
pub mod mounts;


pub use local::{LocalFillFile, LocalVolume, LocalVolumeResolver};
pub use mounts::{MountEntry, MountTable};

use crate::algorithms::EraseSink;
use crate::WipeResult;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// A mounted volume whose unused space is being erased
pub trait Volume: Send + Sync + fmt::Debug {
    /// Root directory of the volume
    fn mount_point(&self) -> &Path;

    /// Filesystem type as reported by the mount table (`ext4`, `btrfs`)
    fn fs_type(&self) -> &str;

    /// Bytes available to the current user right now. Never cached.
    fn available_free_space(&self) -> io::Result<u64>;

    /// Allocation granularity in bytes
    fn cluster_size(&self) -> u64;

    /// Whether disk quotas are active on the volume
    fn has_quota(&self) -> bool;

    /// Create a new file at `path`, failing if it already exists, with write-through semantics
    fn create_fill_file(&self, path: &Path) -> io::Result<Box<dyn FillFile>>;

    /// Clear the compression attribute of `dir`. Returns whether it was set.
    fn clear_compression(&self, dir: &Path) -> io::Result<bool>;
}

/// A bulk-fill file: an erase sink whose length is reserved up front
pub trait FillFile: EraseSink + Send {
    /// Reserve exactly `length` bytes on the medium
    fn allocate(&mut self, length: u64) -> io::Result<()>;

    fn as_sink(&mut self) -> &mut dyn EraseSink;
}

/// Resolves a drive identifier (any path on the volume) to its volume
pub trait VolumeResolver: Send + Sync {
    fn resolve(&self, drive: &Path) -> WipeResult<Arc<dyn Volume>>;
}
