use super::{FileSystem, NAME_MAX};
use crate::algorithms::{EraseSink, ErasureMethod};
use crate::crypto::Prng;
use crate::volume::Volume;
use crate::{WipeError, WipeResult};
use nix::sys::time::TimeVal;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{FileExt, MetadataExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Generic Unix implementation, parameterised by how much file data the
/// filesystem stores inline in its inode table.
#[derive(Debug, Clone)]
pub struct UnixFileSystem {
    name: String,
    resident_size: u64,
    max_resident_files: usize,
}

impl UnixFileSystem {
    /// ext4 `inline_data`: the 60-byte block map area of the inode
    pub const EXT_INLINE_DATA: u64 = 60;

    /// btrfs default `max_inline`
    pub const BTRFS_INLINE_DATA: u64 = 2048;

    pub fn new(name: impl Into<String>, resident_size: u64, max_resident_files: usize) -> Self {
        Self {
            name: name.into(),
            resident_size,
            max_resident_files,
        }
    }

    pub fn resident_size(&self) -> u64 {
        self.resident_size
    }

    fn walk(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(root)
            .same_file_system(true)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
    }

    /// Erase the slack of a single file, restoring its length and times afterwards.
    ///
    /// The file is only touched under a write lease, so no other process can have
    /// it open while bytes past its end exist. Files in use are skipped.
    fn erase_tip(
        path: &Path,
        cluster_size: u64,
        method: &dyn ErasureMethod,
        prng: &mut dyn Prng,
    ) -> WipeResult<()> {
        if tip_length(fs::symlink_metadata(path)?.len(), cluster_size) == 0 {
            return Ok(());
        }

        let file = OpenOptions::new().write(true).open(path)?;
        let lease = match WriteLease::acquire(&file) {
            Ok(lease) => lease,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "File in use, cluster tip skipped"
                );
                return Ok(());
            }
        };

        // Length and times as of the lease, not the walk
        let metadata = file.metadata()?;
        let length = metadata.len();
        let tip = tip_length(length, cluster_size);
        if tip == 0 {
            return Ok(());
        }

        let result = {
            let mut sink = TipSink::new(&file, length, tip);
            method.erase(&mut sink, tip, prng, &mut |_, _, _| Ok(()))
        };

        let end = file.metadata()?.len();
        if end > length + tip {
            // Someone else wrote past the tip; their data must survive
            return Err(WipeError::Io(io::Error::other(format!(
                "grew from {} to {} bytes during the erase",
                length, end
            ))));
        }
        if !lease.is_held() {
            tracing::warn!(
                path = %path.display(),
                "Write lease broken during cluster tip erase"
            );
        }

        // Always cut the file back to its logical length
        file.set_len(length)?;
        file.sync_data()?;
        drop(lease);
        drop(file);
        restore_times(path, &metadata)?;

        result
    }

    /// Create as many small files as the filesystem will take, up to the limit
    fn create_resident_files(&self, work_dir: &Path) -> Vec<PathBuf> {
        let contents = vec![0u8; self.resident_size as usize];
        let mut created = Vec::new();

        while created.len() < self.max_resident_files {
            let path = self.generate_unique_name(work_dir, 16);
            let outcome = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .and_then(|mut f| f.write_all(&contents));
            match outcome {
                Ok(()) => created.push(path),
                Err(e) => {
                    tracing::debug!(error = %e, created = created.len(), "File table full");
                    break;
                }
            }
        }

        created
    }
}

impl FileSystem for UnixFileSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn erase_cluster_tips(
        &self,
        volume: &dyn Volume,
        method: &dyn ErasureMethod,
        prng: &mut dyn Prng,
        on_search: &mut dyn FnMut(&Path) -> WipeResult<()>,
        on_erase: &mut dyn FnMut(usize, usize, &Path) -> WipeResult<()>,
    ) -> WipeResult<()> {
        let mut files = Vec::new();
        for entry in Self::walk(volume.mount_point()) {
            if entry.file_type().is_file() {
                on_search(entry.path())?;
                files.push(entry.into_path());
            }
        }

        let total = files.len();
        for (index, path) in files.iter().enumerate() {
            on_erase(index, total, path)?;
            match Self::erase_tip(path, volume.cluster_size(), method, prng) {
                Ok(()) => {}
                Err(WipeError::Canceled) => return Err(WipeError::Canceled),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cluster tip not erased");
                }
            }
        }

        Ok(())
    }

    fn erase_old_resident_files(
        &self,
        _volume: &dyn Volume,
        work_dir: &Path,
        method: &dyn ErasureMethod,
        prng: &mut dyn Prng,
        on_progress: &mut dyn FnMut(usize, usize) -> WipeResult<()>,
    ) -> WipeResult<()> {
        if self.resident_size == 0 || self.max_resident_files == 0 {
            return Ok(());
        }

        let files = self.create_resident_files(work_dir);
        let total = files.len();
        for (index, path) in files.iter().enumerate() {
            let mut file = OpenOptions::new().write(true).open(path)?;
            method.erase(&mut file, self.resident_size, prng, &mut |_, _, _| Ok(()))?;
            drop(file);
            self.reset_file_times(path)?;
            on_progress(index + 1, total)?;
        }

        Ok(())
    }

    fn erase_directory_structures(
        &self,
        volume: &dyn Volume,
        on_progress: &mut dyn FnMut(usize, usize) -> WipeResult<()>,
    ) -> WipeResult<()> {
        let directories: Vec<PathBuf> = Self::walk(volume.mount_point())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect();

        let total = directories.len();
        for (index, dir) in directories.iter().enumerate() {
            if let Err(e) = self.scrub_directory(dir) {
                tracing::warn!(path = %dir.display(), error = %e, "Directory not scrubbed");
            }
            on_progress(index + 1, total)?;
        }

        Ok(())
    }
}

impl UnixFileSystem {
    /// Reuse a freed directory slot with a maximum-length name, then release it
    fn scrub_directory(&self, dir: &Path) -> io::Result<()> {
        let metadata = fs::metadata(dir)?;
        let path = self.generate_unique_name(dir, NAME_MAX);
        File::create(&path)?;
        fs::remove_file(&path)?;
        restore_times(dir, &metadata)
    }
}

/// Bytes between the end of a file and the end of its last cluster
pub fn tip_length(length: u64, cluster_size: u64) -> u64 {
    if cluster_size == 0 {
        return 0;
    }
    match length % cluster_size {
        0 => 0,
        used => cluster_size - used,
    }
}

fn restore_times(path: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    let atime = TimeVal::new(metadata.atime(), metadata.atime_nsec() / 1000);
    let mtime = TimeVal::new(metadata.mtime(), metadata.mtime_nsec() / 1000);
    nix::sys::stat::utimes(path, &atime, &mtime)?;
    Ok(())
}

/// Linux write lease on an open file, released on drop.
///
/// The kernel grants it only while no other descriptor has the file open, and
/// holds back any other `open` until the lease is released or broken.
struct WriteLease<'a> {
    file: &'a File,
}

#[cfg(target_os = "linux")]
impl<'a> WriteLease<'a> {
    fn acquire(file: &'a File) -> io::Result<Self> {
        // SAFETY: the descriptor stays open for the lifetime of `file`
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLEASE, libc::F_WRLCK) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { file })
    }

    /// False once another open has started breaking the lease
    fn is_held(&self) -> bool {
        // SAFETY: as above
        let lease = unsafe { libc::fcntl(self.file.as_raw_fd(), libc::F_GETLEASE) };
        lease == libc::F_WRLCK
    }
}

#[cfg(not(target_os = "linux"))]
#[allow(dead_code)]
impl<'a> WriteLease<'a> {
    fn acquire(_file: &'a File) -> io::Result<Self> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "write leases need Linux"))
    }

    fn is_held(&self) -> bool {
        false
    }
}

#[cfg(target_os = "linux")]
impl Drop for WriteLease<'_> {
    fn drop(&mut self) {
        // SAFETY: as above
        unsafe {
            libc::fcntl(self.file.as_raw_fd(), libc::F_SETLEASE, libc::F_UNLCK);
        }
    }
}

/// Erase sink over the slack region `[base, base + len)` of a file.
///
/// Offsets seen by the erasure method are relative to `base`.
#[derive(Debug)]
pub struct TipSink<'a> {
    file: &'a File,
    base: u64,
    len: u64,
    pos: u64,
}

impl<'a> TipSink<'a> {
    pub fn new(file: &'a File, base: u64, len: u64) -> Self {
        Self {
            file,
            base,
            len,
            pos: 0,
        }
    }
}

impl Write for TipSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos) as usize;
        let n = buf.len().min(remaining);
        if n == 0 {
            return Ok(0);
        }
        let written = self.file.write_at(&buf[..n], self.base + self.pos)?;
        self.pos += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self.file;
        file.flush()
    }
}

impl Seek for TipSink<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(offset) => {
                self.pos = offset;
                Ok(offset)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of cluster tip",
            )),
        }
    }
}

impl EraseSink for TipSink<'_> {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }
}
