//! Host-level checks and settings the erasure pipeline consults or toggles.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

// Process-wide low-disk-space notification switch
static LOW_DISK_SPACE_NOTIFICATIONS: AtomicBool = AtomicBool::new(true);

/// Snapshot locations used by common Linux checkpointing tools, relative to the mount point
const SNAPSHOT_DIRS: [&str; 4] = [
    ".snapshots",                // snapper
    "timeshift/snapshots",       // timeshift (rsync)
    "timeshift-btrfs/snapshots", // timeshift (btrfs)
    ".zfs/snapshot",             // zfs
];

#[cfg_attr(test, mockall::automock)]
pub trait Platform: Send + Sync {
    /// Whether the process may access raw unused space
    fn is_elevated(&self) -> bool;

    /// Whether system snapshots exist that keep copies of deleted data on the volume
    fn has_restore_points(&self, mount_point: &Path) -> bool;

    fn low_disk_space_notifications(&self) -> bool;

    fn set_low_disk_space_notifications(&self, enabled: bool);
}

/// The running host
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPlatform {
    assume_elevated: bool,
}

impl LocalPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the privilege check (`--unsafe-mode`)
    pub fn assume_elevated(mut self, assume: bool) -> Self {
        self.assume_elevated = assume;
        self
    }
}

impl Platform for LocalPlatform {
    fn is_elevated(&self) -> bool {
        self.assume_elevated || is_root()
    }

    fn has_restore_points(&self, mount_point: &Path) -> bool {
        SNAPSHOT_DIRS.iter().any(|dir| {
            fs::read_dir(mount_point.join(dir))
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false)
        })
    }

    fn low_disk_space_notifications(&self) -> bool {
        LOW_DISK_SPACE_NOTIFICATIONS.load(Ordering::SeqCst)
    }

    fn set_low_disk_space_notifications(&self, enabled: bool) {
        LOW_DISK_SPACE_NOTIFICATIONS.store(enabled, Ordering::SeqCst);
    }
}

pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}
