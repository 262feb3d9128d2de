//! Progress composition for multi-phase erasure.
//!
//! A [`ProgressManager`] tracks one unit of work as `completed / total`. A
//! [`SteppedProgressManager`] combines weighted children (leaves or other stepped
//! managers) into one aggregate ratio. Steps may be appended while work is already
//! running, so optional phases only register themselves when they actually start.

pub mod manager;
pub mod sink;
pub mod stepped;

#[cfg(test)]
mod progress_tests;

pub use manager::ProgressManager;
pub use sink::{NullSink, ProgressDetail, ProgressEvent, ProgressSink};
pub use stepped::{ProgressStep, StepSnapshot, SteppedProgressManager};

use std::fmt;
use std::time::Duration;

/// Anything that can report a completion ratio.
pub trait Progress: Send + Sync + fmt::Debug {
    /// Completion ratio in `0.0..=1.0`. Never decreases.
    fn ratio(&self) -> f32;

    /// Force the ratio to 1.0 regardless of the underlying counts.
    fn mark_complete(&self);

    fn is_complete(&self) -> bool;

    /// Weighted sub-steps, empty for leaf managers
    fn children(&self) -> Vec<StepSnapshot> {
        Vec::new()
    }

    /// Units per second, for managers that count bytes or items
    fn speed(&self) -> Option<f64> {
        None
    }

    /// Estimated time until this unit of work finishes
    fn time_left(&self) -> Option<Duration> {
        None
    }
}

/// Keeps `value` as a high-water mark and returns the larger of the stored and new ratio.
///
/// Non-negative `f32` values order the same way as their bit patterns, so the
/// maximum can be kept in an `AtomicU32`.
pub(crate) fn raise_high_water(mark: &std::sync::atomic::AtomicU32, value: f32) -> f32 {
    use std::sync::atomic::Ordering;

    let value = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    let previous = mark
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            if value > f32::from_bits(bits) {
                Some(value.to_bits())
            } else {
                None
            }
        })
        .unwrap_or_else(|bits| bits);

    f32::from_bits(previous).max(value)
}
