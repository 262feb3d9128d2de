use super::{FillFile, MountTable, Volume, VolumeResolver};
use crate::algorithms::EraseSink;
use crate::{WipeError, WipeResult};
use nix::sys::statvfs::statvfs;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A locally mounted filesystem
#[derive(Debug, Clone)]
pub struct LocalVolume {
    mount_point: PathBuf,
    fs_type: String,
    cluster_size: u64,
    quota: bool,
}

impl LocalVolume {
    /// Locate the volume holding `drive` in the mount table
    pub fn open(drive: &Path) -> WipeResult<Self> {
        let path = drive
            .canonicalize()
            .map_err(|e| WipeError::VolumeNotFound(format!("{}: {}", drive.display(), e)))?;
        let table = MountTable::load()?;
        let entry = table
            .find(&path)
            .ok_or_else(|| WipeError::VolumeNotFound(path.display().to_string()))?;

        let stats = statvfs(&entry.mount_point).map_err(io::Error::from)?;
        let cluster_size = (stats.fragment_size() as u64).max(1);

        tracing::debug!(
            mount_point = %entry.mount_point.display(),
            fs_type = %entry.fs_type,
            cluster_size,
            "Resolved volume"
        );

        Ok(Self {
            mount_point: entry.mount_point.clone(),
            fs_type: entry.fs_type.clone(),
            cluster_size,
            quota: entry.has_quota(),
        })
    }
}

impl Volume for LocalVolume {
    fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    fn fs_type(&self) -> &str {
        &self.fs_type
    }

    fn available_free_space(&self) -> io::Result<u64> {
        let stats = statvfs(&self.mount_point)?;
        Ok((stats.blocks_available() as u64).saturating_mul(stats.fragment_size() as u64))
    }

    fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    fn has_quota(&self) -> bool {
        self.quota
    }

    fn create_fill_file(&self, path: &Path) -> io::Result<Box<dyn FillFile>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .custom_flags(libc::O_SYNC)
            .open(path)?;

        Ok(Box::new(LocalFillFile { file }))
    }

    #[cfg(target_os = "linux")]
    fn clear_compression(&self, dir: &Path) -> io::Result<bool> {
        use nix::errno::Errno;
        use std::os::unix::io::AsRawFd;

        nix::ioctl_read!(fs_ioc_getflags, b'f', 1, libc::c_long);
        nix::ioctl_write_ptr!(fs_ioc_setflags, b'f', 2, libc::c_long);
        const FS_COMPR_FL: libc::c_long = 0x0000_0004;

        let handle = File::open(dir)?;
        let fd = handle.as_raw_fd();
        let mut flags: libc::c_long = 0;

        // SAFETY: fd is an open descriptor and flags outlives the call
        match unsafe { fs_ioc_getflags(fd, &mut flags) } {
            Ok(_) => {}
            // Filesystem without inode attribute support
            Err(Errno::ENOTTY) | Err(Errno::EOPNOTSUPP) | Err(Errno::EINVAL) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        if flags & FS_COMPR_FL == 0 {
            return Ok(false);
        }

        flags &= !FS_COMPR_FL;
        // SAFETY: as above
        unsafe { fs_ioc_setflags(fd, &flags) }?;
        Ok(true)
    }

    #[cfg(not(target_os = "linux"))]
    fn clear_compression(&self, _dir: &Path) -> io::Result<bool> {
        Ok(false)
    }
}

/// Fill file on a local volume, opened with `O_SYNC`
#[derive(Debug)]
pub struct LocalFillFile {
    file: File,
}

impl Write for LocalFillFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LocalFillFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl EraseSink for LocalFillFile {
    fn len(&mut self) -> io::Result<u64> {
        EraseSink::len(&mut self.file)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }
}

impl FillFile for LocalFillFile {
    #[cfg(target_os = "linux")]
    fn allocate(&mut self, length: u64) -> io::Result<()> {
        use nix::fcntl::{fallocate, posix_fallocate, FallocateFlags};
        use std::os::unix::io::AsRawFd;

        let fd = self.file.as_raw_fd();
        let outcome = reserve(
            length,
            |len| fallocate(fd, FallocateFlags::empty(), 0, len),
            |len| posix_fallocate(fd, 0, len),
        );
        if outcome.is_err() {
            // Release whatever was reserved before the failure
            self.file.set_len(0)?;
        }
        outcome
    }

    #[cfg(not(target_os = "linux"))]
    fn allocate(&mut self, length: u64) -> io::Result<()> {
        self.file.set_len(length)
    }

    fn as_sink(&mut self) -> &mut dyn EraseSink {
        self
    }
}

/// Reserve `length` bytes with `native`, or with `emulated` where the filesystem
/// has no native preallocation (ZFS before 2.2, NFS, most FUSE mounts).
///
/// A sparse `set_len` would succeed without reserving anything and push the
/// out-of-space failure into the erase passes; `posix_fallocate` writes the
/// blocks instead, so running out of space still fails the allocation.
#[cfg(target_os = "linux")]
pub(crate) fn reserve(
    length: u64,
    native: impl FnOnce(libc::off_t) -> nix::Result<()>,
    emulated: impl FnOnce(libc::off_t) -> nix::Result<()>,
) -> io::Result<()> {
    use nix::errno::Errno;

    let len = libc::off_t::try_from(length).map_err(|_| Errno::EFBIG)?;
    match native(len) {
        Ok(()) => Ok(()),
        Err(Errno::EOPNOTSUPP) => {
            tracing::debug!(length, "fallocate unsupported, reserving blocks by writing");
            Ok(emulated(len)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves drives against the local mount table
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalVolumeResolver;

impl VolumeResolver for LocalVolumeResolver {
    fn resolve(&self, drive: &Path) -> WipeResult<Arc<dyn Volume>> {
        Ok(Arc::new(LocalVolume::open(drive)?))
    }
}
