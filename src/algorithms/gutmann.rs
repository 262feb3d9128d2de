use super::{run_passes, EraseSink, ErasureMethod, Pass, PassProgress};
use crate::crypto::Prng;
use crate::WipeResult;

/// Peter Gutmann's 35-pass method (1996)
#[derive(Debug, Clone, Copy, Default)]
pub struct GutmannWipe;

impl GutmannWipe {
    pub const PASS_COUNT: usize = 35;

    /// Passes 5-31 (indices 4..31) are emitted in random order
    pub const SHUFFLED: std::ops::Range<usize> = 4..31;

    /// The 35-pass Gutmann patterns according to the 1996 paper.
    /// Passes 1-4 and 32-35 are random data.
    /// Passes 5-31 target MFM and RLL (2,7) encodings.
    pub const PATTERNS: [(Option<&'static [u8]>, &'static str); Self::PASS_COUNT] = [
        // First 4 passes: Cryptographically secure random data
        (None, "Random Pass 1"),
        (None, "Random Pass 2"),
        (None, "Random Pass 3"),
        (None, "Random Pass 4"),
        // Passes 5-31: Specific patterns for different encoding schemes
        (Some(&[0x55]), "0x55 - MFM/RLL encoding"), // Pass 5
        (Some(&[0xAA]), "0xAA - MFM/RLL encoding"), // Pass 6
        (Some(&[0x92, 0x49, 0x24]), "0x92 0x49 0x24 - MFM specific"), // Pass 7
        (Some(&[0x49, 0x24, 0x92]), "0x49 0x24 0x92 - MFM specific"), // Pass 8
        (Some(&[0x24, 0x92, 0x49]), "0x24 0x92 0x49 - MFM specific"), // Pass 9
        (Some(&[0x00]), "0x00 - All zeros"),        // Pass 10
        (Some(&[0x11]), "0x11 - Pattern"),          // Pass 11
        (Some(&[0x22]), "0x22 - Pattern"),          // Pass 12
        (Some(&[0x33]), "0x33 - Pattern"),          // Pass 13
        (Some(&[0x44]), "0x44 - Pattern"),          // Pass 14
        (Some(&[0x55]), "0x55 - Pattern"),          // Pass 15
        (Some(&[0x66]), "0x66 - Pattern"),          // Pass 16
        (Some(&[0x77]), "0x77 - Pattern"),          // Pass 17
        (Some(&[0x88]), "0x88 - Pattern"),          // Pass 18
        (Some(&[0x99]), "0x99 - Pattern"),          // Pass 19
        (Some(&[0xAA]), "0xAA - Pattern"),          // Pass 20
        (Some(&[0xBB]), "0xBB - Pattern"),          // Pass 21
        (Some(&[0xCC]), "0xCC - Pattern"),          // Pass 22
        (Some(&[0xDD]), "0xDD - Pattern"),          // Pass 23
        (Some(&[0xEE]), "0xEE - Pattern"),          // Pass 24
        (Some(&[0xFF]), "0xFF - All ones"),         // Pass 25
        (Some(&[0x92, 0x49, 0x24]), "RLL (2,7) pattern 1"), // Pass 26
        (Some(&[0x49, 0x24, 0x92]), "RLL (2,7) pattern 2"), // Pass 27
        (Some(&[0x24, 0x92, 0x49]), "RLL (2,7) pattern 3"), // Pass 28
        (Some(&[0x6D, 0xB6, 0xDB]), "RLL (2,7) pattern 4"), // Pass 29
        (Some(&[0xB6, 0xDB, 0x6D]), "RLL (2,7) pattern 5"), // Pass 30
        (Some(&[0xDB, 0x6D, 0xB6]), "RLL (2,7) pattern 6"), // Pass 31
        // Last 4 passes: Cryptographically secure random data
        (None, "Random Pass 32"),
        (None, "Random Pass 33"),
        (None, "Random Pass 34"),
        (None, "Random Pass 35"),
    ];

    /// Pass list for one run, with the deterministic block shuffled
    pub fn pass_order(prng: &mut dyn Prng) -> WipeResult<Vec<Pass>> {
        let mut passes: Vec<Pass> = Self::PATTERNS
            .iter()
            .map(|(pattern, _)| match pattern {
                Some(bytes) => Pass::Pattern(*bytes),
                None => Pass::Random,
            })
            .collect();

        // Fisher-Yates over the deterministic block
        let block = &mut passes[Self::SHUFFLED];
        for i in (1..block.len()).rev() {
            let j = prng.next_below(i as u32 + 1)? as usize;
            block.swap(i, j);
        }

        Ok(passes)
    }
}

impl ErasureMethod for GutmannWipe {
    fn id(&self) -> &'static str {
        "gutmann"
    }

    fn name(&self) -> &'static str {
        "Gutmann (35 passes)"
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
        let passes = Self::pass_order(prng)?;
        tracing::debug!(passes = passes.len(), "Gutmann pass order drawn");
        run_passes(&passes, sink, length, prng, on_progress)?;
        Ok(())
    }
}
