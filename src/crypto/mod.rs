pub mod prng;


// Re-export
pub use prng::{calculate_entropy, Prng, PrngKind, SystemPrng, UserspacePrng};
