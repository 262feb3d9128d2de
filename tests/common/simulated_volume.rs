use sayonara_freespace::algorithms::EraseSink;
use sayonara_freespace::volume::{FillFile, Volume, VolumeResolver};
use sayonara_freespace::WipeResult;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;

/// Which allocation attempts fail, independent of the free space left
#[derive(Debug, Clone, Default)]
pub enum AllocationPlan {
    /// Only requests larger than the free space fail
    #[default]
    Succeed,
    /// The first `n` attempts fail
    FailFirst(usize),
    /// Every attempt fails
    FailAlways,
    /// Every attempt succeeds but free space never goes down
    NeverCharged,
}

/// One allocation attempt as seen by the volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub requested: u64,
    pub succeeded: bool,
    /// Free space after the attempt
    pub free_after: u64,
}

#[derive(Debug, Default)]
pub struct SimState {
    pub free: u64,
    pub plan: AllocationPlan,
    pub attempts: usize,
    pub allocations: Vec<Allocation>,
    pub files_created: Vec<PathBuf>,
    /// Bytes the erasure methods wrote into fill files
    pub bytes_written: u64,
}

/// A volume backed by a real temporary directory whose free space is simulated.
///
/// Fill files are real (empty) files so the working directory and timestamp
/// handling behave as on a real volume; their content is discarded.
#[derive(Debug, Clone)]
pub struct SimulatedVolume {
    root: Arc<TempDir>,
    cluster: u64,
    quota: bool,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedVolume {
    pub fn new(free: u64, cluster: u64) -> Self {
        Self {
            root: Arc::new(TempDir::new().expect("temp dir")),
            cluster,
            quota: false,
            state: Arc::new(Mutex::new(SimState {
                free,
                ..SimState::default()
            })),
        }
    }

    pub fn with_plan(self, plan: AllocationPlan) -> Self {
        self.state().plan = plan;
        self
    }

    pub fn with_quota(mut self) -> Self {
        self.quota = true;
        self
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn free(&self) -> u64 {
        self.state().free
    }

    /// Successful allocations in order
    pub fn allocated_lengths(&self) -> Vec<u64> {
        self.state()
            .allocations
            .iter()
            .filter(|a| a.succeeded)
            .map(|a| a.requested)
            .collect()
    }

    /// Entries left in the volume root
    pub fn root_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.root())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    pub fn resolver(&self) -> SimulatedResolver {
        SimulatedResolver(self.clone())
    }
}

impl Volume for SimulatedVolume {
    fn mount_point(&self) -> &Path {
        self.root.path()
    }

    fn fs_type(&self) -> &str {
        "simfs"
    }

    fn available_free_space(&self) -> io::Result<u64> {
        Ok(self.state().free)
    }

    fn cluster_size(&self) -> u64 {
        self.cluster
    }

    fn has_quota(&self) -> bool {
        self.quota
    }

    fn create_fill_file(&self, path: &Path) -> io::Result<Box<dyn FillFile>> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        self.state().files_created.push(path.to_path_buf());
        Ok(Box::new(SimFillFile {
            _file: file,
            state: self.state.clone(),
            len: 0,
            pos: 0,
        }))
    }

    fn clear_compression(&self, _dir: &Path) -> io::Result<bool> {
        Ok(false)
    }
}

pub struct SimulatedResolver(SimulatedVolume);

impl VolumeResolver for SimulatedResolver {
    fn resolve(&self, _drive: &Path) -> WipeResult<Arc<dyn Volume>> {
        Ok(Arc::new(self.0.clone()))
    }
}

/// Fill file whose reservation is charged against the simulated free space
pub struct SimFillFile {
    _file: File,
    state: Arc<Mutex<SimState>>,
    len: u64,
    pos: u64,
}

impl FillFile for SimFillFile {
    fn allocate(&mut self, length: u64) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        let planned_failure = match state.plan {
            AllocationPlan::FailFirst(n) => state.attempts <= n,
            AllocationPlan::FailAlways => true,
            AllocationPlan::Succeed | AllocationPlan::NeverCharged => false,
        };

        let succeeded = !planned_failure && length <= state.free;
        if succeeded {
            if !matches!(state.plan, AllocationPlan::NeverCharged) {
                state.free -= length;
            }
            self.len = length;
        }
        let free_after = state.free;
        state.allocations.push(Allocation {
            requested: length,
            succeeded,
            free_after,
        });

        if succeeded {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "No space left on device (simulated)",
            ))
        }
    }

    fn as_sink(&mut self) -> &mut dyn EraseSink {
        self
    }
}

impl Write for SimFillFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pos += buf.len() as u64;
        self.state.lock().unwrap().bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SimFillFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::End(delta) => self.len.saturating_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.saturating_add_signed(delta),
        };
        Ok(self.pos)
    }
}

impl EraseSink for SimFillFile {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.len)
    }
}
