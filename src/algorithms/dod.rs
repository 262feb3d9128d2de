use super::{run_passes, EraseSink, ErasureMethod, Pass, PassProgress};
use crate::crypto::Prng;
use crate::WipeResult;

/// US DoD 5220.22-M (E): zeros, ones, then random data
#[derive(Debug, Clone, Copy, Default)]
pub struct DoDWipe;

impl DoDWipe {
    /// DoD 5220.22-M standard pass 1 pattern (all zeros)
    pub const PASS_1_PATTERN: u8 = 0x00;

    /// DoD 5220.22-M standard pass 2 pattern (all ones)
    pub const PASS_2_PATTERN: u8 = 0xFF;

    /// DoD 5220.22-M requires exactly 3 passes
    pub const PASS_COUNT: usize = 3;

    const PASSES: [Pass; Self::PASS_COUNT] = [
        Pass::Pattern(&[Self::PASS_1_PATTERN]),
        Pass::Pattern(&[Self::PASS_2_PATTERN]),
        Pass::Random,
    ];
}

impl ErasureMethod for DoDWipe {
    fn id(&self) -> &'static str {
        "dod_5220_22m"
    }

    fn name(&self) -> &'static str {
        "US DoD 5220.22-M (3 passes)"
    }

    fn passes(&self) -> u32 {
        Self::PASS_COUNT as u32
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
