use crate::{WipeError, WipeResult};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pseudo-random source handed to erasure methods
pub trait Prng: Send {
    /// Fill buffer with random bytes
    fn fill_bytes(&mut self, dest: &mut [u8]) -> WipeResult<()>;
    /// Get source name for logging
    fn name(&self) -> &'static str;

    /// Uniform value in `0..bound` (bound > 0)
    fn next_below(&mut self, bound: u32) -> WipeResult<u32> {
        let mut raw = [0u8; 4];
        // Rejection sampling keeps the distribution uniform
        let zone = u32::MAX - (u32::MAX % bound);
        loop {
            self.fill_bytes(&mut raw)?;
            let value = u32::from_le_bytes(raw);
            if value < zone {
                return Ok(value % bound);
            }
        }
    }
}

/// Ring-based system random (uses OS facilities)
pub struct SystemPrng {
    rng: SystemRandom,
}

impl Default for SystemPrng {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPrng {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Prng for SystemPrng {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> WipeResult<()> {
        self.rng
            .fill(dest)
            .map_err(|_| WipeError::Prng("Ring SystemRandom failed".to_string()))
    }

    fn name(&self) -> &'static str {
        "SystemPrng"
    }
}

/// Userspace CSPRNG (ChaCha via `StdRng`) seeded from the OS.
///
/// Much faster than asking the kernel for every buffer; reseeds itself from
/// [`SystemPrng`] after `reseed_interval` bytes.
pub struct UserspacePrng {
    rng: StdRng,
    bytes_since_reseed: u64,
    reseed_interval: u64,
}

impl UserspacePrng {
    /// Maximum bytes before automatic reseed (4 GiB)
    pub const DEFAULT_RESEED_INTERVAL: u64 = 1 << 32;

    pub fn new() -> WipeResult<Self> {
        let mut seed = [0u8; 32];
        SystemPrng::new().fill_bytes(&mut seed)?;
        Ok(Self {
            rng: StdRng::from_seed(seed),
            bytes_since_reseed: 0,
            reseed_interval: Self::DEFAULT_RESEED_INTERVAL,
        })
    }

    /// Deterministic stream, for tests and reproducible benchmarks
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            bytes_since_reseed: 0,
            // Never reseed; the stream must stay reproducible
            reseed_interval: u64::MAX,
        }
    }

    fn reseed(&mut self) -> WipeResult<()> {
        let mut seed = [0u8; 32];
        SystemPrng::new().fill_bytes(&mut seed)?;
        self.rng = StdRng::from_seed(seed);
        self.bytes_since_reseed = 0;
        tracing::debug!("Userspace PRNG reseeded");
        Ok(())
    }
}

impl Prng for UserspacePrng {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> WipeResult<()> {
        let request_len = dest.len() as u64;
        if self.bytes_since_reseed.saturating_add(request_len) >= self.reseed_interval {
            self.reseed()?;
        }

        self.rng
            .try_fill_bytes(dest)
            .map_err(|e| WipeError::Prng(e.to_string()))?;
        self.bytes_since_reseed += request_len;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "UserspacePrng"
    }
}

/// Which PRNG erasure methods draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PrngKind {
    /// Kernel CSPRNG through ring
    System,
    /// OS-seeded ChaCha stream in userspace
    #[default]
    Userspace,
}

impl PrngKind {
    pub fn create(&self) -> WipeResult<Box<dyn Prng>> {
        match self {
            PrngKind::System => Ok(Box::new(SystemPrng::new())),
            PrngKind::Userspace => Ok(Box::new(UserspacePrng::new()?)),
        }
    }
}

impl fmt::Display for PrngKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrngKind::System => write!(f, "system"),
            PrngKind::Userspace => write!(f, "userspace"),
        }
    }
}

/// Shannon entropy of a buffer in bits per byte
pub fn calculate_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }

    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}
