//! The bulk fill: consume every free byte of a volume with files whose content
//! is written by an erasure method.
//!
//! ```text
//!   free = volume.available_free_space()       (re-sampled every iteration)
//!   while free > 0:
//!       file   = create_new(work_dir/<random>)   (write-through)
//!       length = min(fill_unit, free)
//!       allocate(length), shrinking by one cluster on failure
//!       method.erase(file, ERASE_TO_END)          (progress + cancellation per chunk)
//!       close file, reset its timestamps          (always)
//! ```
//!
//! Files are created and erased strictly one after another.

use crate::algorithms::{ErasureMethod, ERASE_TO_END};
use crate::crypto::Prng;
use crate::error::AllocationRetry;
use crate::filesystem::FileSystem;
use crate::progress::{Progress, ProgressManager};
use crate::volume::Volume;
use crate::{WipeError, WipeResult};
use std::path::Path;

/// Name length of individual fill files
pub const FILL_FILE_NAME_LEN: usize = 18;

/// Successful iterations without a drop in free space before the fill gives up
pub const MAX_STALLED_ITERATIONS: u32 = 8;

/// Result of a completed fill
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillSummary {
    /// Fill files created and erased
    pub files: usize,
    /// Bytes reserved across all fill files
    pub allocated: u64,
}

/// One fill run over a volume
pub struct FreeSpaceFill<'a> {
    pub volume: &'a dyn Volume,
    pub filesystem: &'a dyn FileSystem,
    pub method: &'a dyn ErasureMethod,
    pub work_dir: &'a Path,
    /// Maximum length of one fill file
    pub fill_unit: u64,
}

impl FreeSpaceFill<'_> {
    /// Fill the volume, accumulating written bytes into `step`.
    ///
    /// `on_chunk` runs after every chunk with the current pass index; returning an
    /// error (typically `Canceled`) aborts the fill. `step` is marked complete once
    /// free space reads zero.
    pub fn run(
        &self,
        prng: &mut dyn Prng,
        step: &ProgressManager,
        on_chunk: &mut dyn FnMut(&ProgressManager, u32) -> WipeResult<()>,
    ) -> WipeResult<FillSummary> {
        let fill_unit = self.fill_unit.max(1);
        let mut summary = FillSummary::default();
        let mut previous_free: Option<u64> = None;
        let mut stalled = 0u32;

        loop {
            let free = self.volume.available_free_space()?;
            if free == 0 {
                break;
            }

            match previous_free {
                Some(previous) if free >= previous => {
                    stalled += 1;
                    if stalled >= MAX_STALLED_ITERATIONS {
                        return Err(WipeError::FillStalled(
                            self.volume.mount_point().display().to_string(),
                        ));
                    }
                }
                _ => stalled = 0,
            }
            previous_free = Some(free);

            step.set_total(step.completed() + self.method.estimate_output_size(free));

            let path = self
                .filesystem
                .generate_unique_name(self.work_dir, FILL_FILE_NAME_LEN);
            let allocated = self.fill_one(&path, fill_unit.min(free), prng, step, on_chunk)?;

            summary.files += 1;
            summary.allocated += allocated;
            tracing::debug!(
                path = %path.display(),
                allocated,
                free,
                "Fill file erased"
            );
        }

        step.mark_complete();
        Ok(summary)
    }

    /// Create, size and erase a single fill file; its timestamps are reset on every path
    fn fill_one(
        &self,
        path: &Path,
        length: u64,
        prng: &mut dyn Prng,
        step: &ProgressManager,
        on_chunk: &mut dyn FnMut(&ProgressManager, u32) -> WipeResult<()>,
    ) -> WipeResult<u64> {
        let mut file = self.volume.create_fill_file(path)?;

        let retry = AllocationRetry::new(self.volume.cluster_size());
        let result = retry
            .run(length, |len| file.allocate(len))
            .map_err(|(length, source)| WipeError::AllocationExhausted {
                path: path.to_path_buf(),
                length,
                source,
            })
            .and_then(|allocated| {
                self.method
                    .erase(file.as_sink(), ERASE_TO_END, prng, &mut |written, _, pass| {
                        step.add_completed(written);
                        on_chunk(step, pass)
                    })
                    .map(|()| allocated)
            });

        drop(file);
        let reset = self.filesystem.reset_file_times(path);

        let allocated = result?;
        reset?;
        Ok(allocated)
    }
}
