//! Filesystem-specific erasure capabilities.
//!
//! The unused-space orchestrator does not know how a filesystem stores slack,
//! small-file data or directory entries. It resolves a [`FileSystem`] for the
//! volume's type through a [`FileSystemRegistry`] and drives it with callbacks.

pub mod unix;


pub use unix::{TipSink, UnixFileSystem};

use crate::algorithms::ErasureMethod;
use crate::crypto::Prng;
use crate::volume::Volume;
use crate::WipeResult;
use nix::sys::time::TimeVal;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest file name most Unix filesystems accept
pub const NAME_MAX: usize = 255;

pub trait FileSystem: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Overwrite the slack after the end of every file on the volume.
    ///
    /// `on_search` is called once per file found, `on_erase` with
    /// `(index, total, path)` before each file's tip is erased.
    fn erase_cluster_tips(
        &self,
        volume: &dyn Volume,
        method: &dyn ErasureMethod,
        prng: &mut dyn Prng,
        on_search: &mut dyn FnMut(&Path) -> WipeResult<()>,
        on_erase: &mut dyn FnMut(usize, usize, &Path) -> WipeResult<()>,
    ) -> WipeResult<()>;

    /// Overwrite file-table slots that held data of small deleted files.
    ///
    /// Scratch files go into `work_dir`; `on_progress` receives `(current, total)`.
    fn erase_old_resident_files(
        &self,
        volume: &dyn Volume,
        work_dir: &Path,
        method: &dyn ErasureMethod,
        prng: &mut dyn Prng,
        on_progress: &mut dyn FnMut(usize, usize) -> WipeResult<()>,
    ) -> WipeResult<()>;

    /// Overwrite stale entries in every directory of the volume
    fn erase_directory_structures(
        &self,
        volume: &dyn Volume,
        on_progress: &mut dyn FnMut(usize, usize) -> WipeResult<()>,
    ) -> WipeResult<()>;

    /// A path inside `parent` that does not exist yet, with a random name of `max_len` characters
    fn generate_unique_name(&self, parent: &Path, max_len: usize) -> PathBuf {
        let len = max_len.clamp(1, NAME_MAX);
        let mut rng = rand::thread_rng();
        loop {
            let name: String = (&mut rng)
                .sample_iter(Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            let candidate = parent.join(name);
            if !candidate.exists() {
                return candidate;
            }
        }
    }

    /// Set access and modification time of `path` to the epoch
    fn reset_file_times(&self, path: &Path) -> io::Result<()> {
        let epoch = TimeVal::new(0, 0);
        nix::sys::stat::utimes(path, &epoch, &epoch)?;
        Ok(())
    }
}

/// Filesystem implementations keyed by mount-table type
#[derive(Debug, Clone)]
pub struct FileSystemRegistry {
    by_type: BTreeMap<String, Arc<dyn FileSystem>>,
    fallback: Arc<dyn FileSystem>,
}

impl FileSystemRegistry {
    pub fn new(fallback: Arc<dyn FileSystem>) -> Self {
        Self {
            by_type: BTreeMap::new(),
            fallback,
        }
    }

    /// ext2/3/4 and btrfs with their inline-data sizes, everything else without resident data
    pub fn with_builtin(resident_file_limit: usize) -> Self {
        let mut registry = Self::new(Arc::new(UnixFileSystem::new("generic", 0, 0)));

        let ext = Arc::new(UnixFileSystem::new(
            "ext",
            UnixFileSystem::EXT_INLINE_DATA,
            resident_file_limit,
        ));
        for fs_type in ["ext2", "ext3", "ext4"] {
            registry.register(fs_type, ext.clone());
        }
        registry.register(
            "btrfs",
            Arc::new(UnixFileSystem::new(
                "btrfs",
                UnixFileSystem::BTRFS_INLINE_DATA,
                resident_file_limit,
            )),
        );

        registry
    }

    pub fn register(&mut self, fs_type: &str, fs: Arc<dyn FileSystem>) {
        self.by_type.insert(fs_type.to_string(), fs);
    }

    pub fn resolve(&self, fs_type: &str) -> Arc<dyn FileSystem> {
        self.by_type
            .get(fs_type)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
