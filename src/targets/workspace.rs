use crate::filesystem::FileSystem;
use crate::platform::Platform;
use crate::WipeResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Length of the random working directory name
pub const WORK_DIR_NAME_LEN: usize = 18;

/// Scoped acquisition of the fill phase's shared resources.
///
/// Owns the temporary working directory and the pre-phase value of the
/// low-disk-space notification setting. [`Workspace::close`] releases both and
/// reports failures; dropping an unclosed workspace releases them best-effort.
pub struct Workspace<'a> {
    path: PathBuf,
    platform: &'a dyn Platform,
    notifications: bool,
    closed: bool,
}

impl<'a> Workspace<'a> {
    /// Create a uniquely named directory under `root`
    pub fn create(
        fs: &dyn FileSystem,
        root: &Path,
        platform: &'a dyn Platform,
    ) -> WipeResult<Self> {
        let notifications = platform.low_disk_space_notifications();
        let path = fs.generate_unique_name(root, WORK_DIR_NAME_LEN);
        fs::create_dir(&path)?;
        tracing::debug!(path = %path.display(), "Created working directory");

        Ok(Self {
            path,
            platform,
            notifications,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Suspend low-disk-space notifications until the workspace is released
    pub fn suspend_notifications(&self) {
        self.platform.set_low_disk_space_notifications(false);
    }

    /// Remove the directory tree and restore the notification setting
    pub fn close(mut self) -> WipeResult<()> {
        self.closed = true;
        self.release().map_err(Into::into)
    }

    fn release(&self) -> io::Result<()> {
        let removed = match fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
        self.platform
            .set_low_disk_space_notifications(self.notifications);
        removed
    }
}

impl Drop for Workspace<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.release() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Working directory not removed"
                );
            }
        }
    }
}
