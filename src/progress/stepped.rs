use super::{raise_high_water, Progress, ProgressManager};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

/// One weighted child of a [`SteppedProgressManager`].
///
/// The weight is fixed when the step is added, before the child produces values.
#[derive(Debug, Clone)]
pub struct ProgressStep {
    pub progress: Arc<dyn Progress>,
    pub weight: f32,
    pub label: String,
}

impl ProgressStep {
    pub fn new(progress: Arc<dyn Progress>, weight: f32, label: impl Into<String>) -> Self {
        Self {
            progress,
            weight: weight.max(0.0),
            label: label.into(),
        }
    }
}

/// Point-in-time view of a step, for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct StepSnapshot {
    pub label: String,
    pub weight: f32,
    pub ratio: f32,
    /// Sub-steps when the step is itself stepped
    pub children: Vec<StepSnapshot>,
}

impl StepSnapshot {
    fn of(step: &ProgressStep) -> Self {
        Self {
            label: step.label.clone(),
            weight: step.weight,
            ratio: step.progress.ratio(),
            children: step.progress.children(),
        }
    }
}

/// Weighted aggregate of an ordered, growing list of steps.
///
/// Aggregate ratio = Σ(step.ratio × step.weight), capped at 1.0. Appending a step
/// never changes the weights of earlier ones.
#[derive(Debug, Default)]
pub struct SteppedProgressManager {
    steps: RwLock<Vec<ProgressStep>>,
    complete: AtomicBool,
    high_water: AtomicU32,
}

impl SteppedProgressManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&self, step: ProgressStep) {
        let mut steps = self.steps.write().unwrap_or_else(|e| e.into_inner());
        steps.push(step);
    }

    /// Register a fresh leaf manager as a step and hand it back to the caller
    pub fn add_leaf(&self, weight: f32, label: impl Into<String>) -> Arc<ProgressManager> {
        let leaf = Arc::new(ProgressManager::new());
        self.add_step(ProgressStep::new(leaf.clone(), weight, label));
        leaf
    }

    pub fn len(&self) -> usize {
        self.read_steps().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all registered step weights
    pub fn total_weight(&self) -> f32 {
        self.read_steps().iter().map(|s| s.weight).sum()
    }

    pub fn steps(&self) -> Vec<StepSnapshot> {
        self.read_steps().iter().map(StepSnapshot::of).collect()
    }

    fn read_steps(&self) -> std::sync::RwLockReadGuard<'_, Vec<ProgressStep>> {
        self.steps.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Progress for SteppedProgressManager {
    fn ratio(&self) -> f32 {
        if self.complete.load(Ordering::Acquire) {
            return raise_high_water(&self.high_water, 1.0);
        }

        let sum: f32 = self
            .read_steps()
            .iter()
            .map(|s| s.progress.ratio() * s.weight)
            .sum();
        raise_high_water(&self.high_water, sum.min(1.0))
    }

    fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    fn children(&self) -> Vec<StepSnapshot> {
        self.steps()
    }
}
