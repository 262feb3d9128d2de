//! Erasure methods: pass-pattern overwrite algorithms applied to a byte range.
//!
//! Every built-in method is a list of [`Pass`]es executed by [`run_passes`]. A
//! method writes into an [`EraseSink`] (a fill file, a cluster tip, a resident
//! file) and reports each written chunk through a [`PassProgress`] callback. The
//! callback may return `Err(WipeError::Canceled)` to abort mid-pass.

pub mod dod;
pub mod gutmann;
pub mod random;
pub mod zero;


pub use dod::DoDWipe;
pub use gutmann::GutmannWipe;
pub use random::RandomWipe;
pub use zero::ZeroWipe;

use crate::crypto::Prng;
use crate::{WipeError, WipeResult};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Maximum size of one bulk-fill file (10 MiB)
pub const FREE_SPACE_FILE_UNIT: u64 = 10 * 1024 * 1024;

/// Erase length meaning "everything the sink currently holds"
pub const ERASE_TO_END: u64 = u64::MAX;

/// Write granularity of the pass engine; progress and cancellation are observed per chunk
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Progress callback: `(bytes_written_by_this_chunk, total_for_this_call, pass_index)`.
///
/// `pass_index` is 1-based.
pub type PassProgress<'a> = dyn FnMut(u64, u64, u32) -> WipeResult<()> + 'a;

/// Seekable byte destination an erasure method overwrites
pub trait EraseSink: Write + Seek {
    /// Current logical length of the sink
    fn len(&mut self) -> io::Result<u64>;

    /// Force written data to the medium
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl EraseSink for File {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl EraseSink for Cursor<Vec<u8>> {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }
}

/// A pass-pattern overwrite algorithm
pub trait ErasureMethod: Send + Sync + fmt::Debug {
    /// Stable identifier used in configuration (`"gutmann"`)
    fn id(&self) -> &'static str;

    /// Human readable name
    fn name(&self) -> &'static str;

    fn passes(&self) -> u32;

    /// Whether this method may be used to fill unused space
    fn supports_unused_space(&self) -> bool {
        true
    }

    /// Bytes this method will write to erase `length` bytes, for progress scaling
    fn estimate_output_size(&self, length: u64) -> u64 {
        length.saturating_mul(u64::from(self.passes()))
    }

    /// Overwrite `min(length, sink length)` bytes from offset 0 once per pass
    fn erase(
        &self,
        sink: &mut dyn EraseSink,
        length: u64,
        prng: &mut dyn Prng,
        on_progress: &mut PassProgress<'_>,
    ) -> WipeResult<()>;
}

/// Contents of a single overwrite pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pass {
    Random,
    /// Repeating byte pattern, aligned to absolute sink offsets
    Pattern(&'static [u8]),
}

impl Pass {
    fn fill(&self, buf: &mut [u8], offset: u64, prng: &mut dyn Prng) -> WipeResult<()> {
        match self {
            Pass::Random => prng.fill_bytes(buf),
            Pass::Pattern(pattern) if pattern.is_empty() => {
                buf.fill(0);
                Ok(())
            }
            Pass::Pattern(pattern) => {
                let start = (offset % pattern.len() as u64) as usize;
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = pattern[(start + i) % pattern.len()];
                }
                Ok(())
            }
        }
    }
}

/// Execute `passes` over the sink in order.
///
/// Each pass rewinds to offset 0, writes in [`CHUNK_SIZE`] chunks and syncs
/// before the next pass starts. Returns the number of bytes written per pass.
pub fn run_passes(
    passes: &[Pass],
    sink: &mut dyn EraseSink,
    length: u64,
    prng: &mut dyn Prng,
    on_progress: &mut PassProgress<'_>,
) -> WipeResult<u64> {
    let length = length.min(sink.len()?);
    let total_for_call = length.saturating_mul(passes.len() as u64);
    let mut buffer = vec![0u8; CHUNK_SIZE.min(length as usize).max(1)];

    for (index, pass) in passes.iter().enumerate() {
        sink.seek(SeekFrom::Start(0))?;
        let mut offset = 0u64;

        while offset < length {
            let chunk = ((length - offset) as usize).min(buffer.len());
            pass.fill(&mut buffer[..chunk], offset, prng)?;
            sink.write_all(&buffer[..chunk])?;
            offset += chunk as u64;
            on_progress(chunk as u64, total_for_call, index as u32 + 1)?;
        }

        sink.flush()?;
        sink.sync()?;
    }

    Ok(length)
}

/// Methods addressable by id
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, Arc<dyn ErasureMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding zero, random, dod_5220_22m and gutmann
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ZeroWipe));
        registry.register(Arc::new(RandomWipe));
        registry.register(Arc::new(DoDWipe));
        registry.register(Arc::new(GutmannWipe));
        registry
    }

    pub fn register(&mut self, method: Arc<dyn ErasureMethod>) {
        self.methods.insert(method.id().to_string(), method);
    }

    pub fn get(&self, id: &str) -> WipeResult<Arc<dyn ErasureMethod>> {
        self.methods
            .get(id)
            .cloned()
            .ok_or_else(|| WipeError::UnknownMethod(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ErasureMethod>> {
        self.methods.values()
    }
}
