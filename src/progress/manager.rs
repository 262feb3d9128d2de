use super::{raise_high_water, Progress};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Leaf progress counter for one unit of work.
///
/// `completed` may transiently overshoot `total`; the ratio is clamped to 1.0.
/// All counters are atomics so an observer thread can read the ratio while the
/// worker updates it.
#[derive(Debug, Default)]
pub struct ProgressManager {
    completed: AtomicU64,
    total: AtomicU64,
    complete: AtomicBool,
    high_water: AtomicU32,
    started: OnceLock<Instant>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total(total: u64) -> Self {
        let manager = Self::new();
        manager.total.store(total, Ordering::Release);
        manager
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn set_completed(&self, completed: u64) {
        self.touch();
        self.completed.store(completed, Ordering::Release);
    }

    /// Add `amount` to the completed counter and return the new value
    pub fn add_completed(&self, amount: u64) -> u64 {
        self.touch();
        self.completed
            .fetch_add(amount, Ordering::AcqRel)
            .saturating_add(amount)
    }

    pub fn set_total(&self, total: u64) {
        self.touch();
        self.total.store(total, Ordering::Release);
    }

    /// Bytes (or items) per second since the first update
    pub fn speed(&self) -> Option<f64> {
        let started = self.started.get()?;
        let elapsed = started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        Some(self.completed() as f64 / elapsed)
    }

    /// Estimated time until `completed` reaches `total` at the current speed
    pub fn time_left(&self) -> Option<Duration> {
        if self.is_complete() {
            return Some(Duration::ZERO);
        }
        let speed = self.speed().filter(|s| *s > 0.0)?;
        let remaining = self.total().saturating_sub(self.completed());
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    fn touch(&self) {
        self.started.get_or_init(Instant::now);
    }
}

impl Progress for ProgressManager {
    fn ratio(&self) -> f32 {
        if self.complete.load(Ordering::Acquire) {
            return raise_high_water(&self.high_water, 1.0);
        }

        let total = self.total();
        let raw = if total == 0 {
            0.0
        } else {
            (self.completed() as f64 / total as f64).min(1.0) as f32
        };
        raise_high_water(&self.high_water, raw)
    }

    /// Sets `completed = total`, and flags the manager done so a manager that never
    /// learned its total still reports 1.0.
    fn mark_complete(&self) {
        self.completed.store(self.total(), Ordering::Release);
        self.complete.store(true, Ordering::Release);
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    fn speed(&self) -> Option<f64> {
        ProgressManager::speed(self)
    }

    fn time_left(&self) -> Option<Duration> {
        ProgressManager::time_left(self)
    }
}
