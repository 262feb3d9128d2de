// Zero Wipe Algorithm - Single pass writing zeros
//
// Fast and simple. Not suitable for high-security requirements but useful for
// quick sanitization of free space on volumes that are being reused in-house.

use super::{run_passes, EraseSink, ErasureMethod, Pass, PassProgress};
use crate::crypto::Prng;
use crate::WipeResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroWipe;

impl ZeroWipe {
    pub const PATTERN: u8 = 0x00;

    const PASSES: [Pass; 1] = [Pass::Pattern(&[Self::PATTERN])];
}

impl ErasureMethod for ZeroWipe {
    fn id(&self) -> &'static str {
        "zero"
    }

    fn name(&self) -> &'static str {
        "Single pass zeros"
    }

    fn passes(&self) -> u32 {
        Self::PASSES.len() as u32
    }

    fn erase(
        &self,
        sink: &mut dyn EraseSink,
        length: u64,
        prng: &mut dyn Prng,
        on_progress: &mut PassProgress<'_>,
    ) -> WipeResult<()> {
        run_passes(&Self::PASSES, sink, length, prng, on_progress)?;
        Ok(())
    }
}
