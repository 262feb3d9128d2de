use super::{run_passes, EraseSink, ErasureMethod, Pass, PassProgress};
use crate::crypto::Prng;
use crate::WipeResult;

/// Single pass of pseudo-random data. Default method for unused space.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWipe;

impl ErasureMethod for RandomWipe {
    fn id(&self) -> &'static str {
        "random"
    }

    fn name(&self) -> &'static str {
        "Pseudorandom data (1 pass)"
    }

    fn passes(&self) -> u32 {
        1
    }

    fn erase(
        &self,
        sink: &mut dyn EraseSink,
        length: u64,
        prng: &mut dyn Prng,
        on_progress: &mut PassProgress<'_>,
    ) -> WipeResult<()> {
        run_passes(&[Pass::Random], sink, length, prng, on_progress)?;
        Ok(())
    }
}
