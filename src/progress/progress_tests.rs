// Tests for progress composition
//
// Tests cover: leaf ratios, mark-complete semantics, weighted aggregation,
// steps appended mid-run, nested stepped managers and monotonicity.

use super::*;
use proptest::prelude::*;
use std::sync::Arc;

const EPSILON: f32 = 1e-5;

// ==================== LEAF MANAGER TESTS ====================

#[test]
fn test_empty_manager_ratio_is_zero() {
    let manager = ProgressManager::new();
    assert_eq!(manager.ratio(), 0.0);
    assert!(!manager.is_complete());
}

#[test]
fn test_ratio_is_completed_over_total() {
    let manager = ProgressManager::with_total(200);
    manager.set_completed(50);
    assert!((manager.ratio() - 0.25).abs() < EPSILON);
}

#[test]
fn test_overshoot_is_clamped() {
    let manager = ProgressManager::with_total(10);
    manager.set_completed(25);
    assert_eq!(manager.ratio(), 1.0);
}

#[test]
fn test_mark_complete_without_total() {
    let manager = ProgressManager::new();
    manager.mark_complete();
    assert_eq!(manager.ratio(), 1.0);
    assert!(manager.is_complete());
}

#[test]
fn test_mark_complete_sets_completed_to_total() {
    let manager = ProgressManager::with_total(64);
    manager.set_completed(10);
    manager.mark_complete();
    assert_eq!(manager.completed(), 64);
    assert_eq!(manager.ratio(), 1.0);
}

#[test]
fn test_growing_total_does_not_lower_ratio() {
    let manager = ProgressManager::with_total(100);
    manager.set_completed(50);
    assert!((manager.ratio() - 0.5).abs() < EPSILON);

    // A larger estimate arrives; the reported ratio holds.
    manager.set_total(400);
    assert!((manager.ratio() - 0.5).abs() < EPSILON);

    manager.set_completed(300);
    assert!((manager.ratio() - 0.75).abs() < EPSILON);
}

#[test]
fn test_add_completed_returns_running_total() {
    let manager = ProgressManager::new();
    assert_eq!(manager.add_completed(10), 10);
    assert_eq!(manager.add_completed(5), 15);
    assert_eq!(manager.completed(), 15);
}

#[test]
fn test_time_left_is_zero_when_complete() {
    let manager = ProgressManager::with_total(10);
    manager.mark_complete();
    assert_eq!(manager.time_left(), Some(std::time::Duration::ZERO));
}

#[test]
fn test_speed_unknown_before_first_update() {
    let manager = ProgressManager::new();
    assert!(manager.speed().is_none());
    assert!(manager.time_left().is_none());
}

// ==================== STEPPED MANAGER TESTS ====================

#[test]
fn test_weighted_sum() {
    let stepped = SteppedProgressManager::new();
    let a = stepped.add_leaf(0.9, "Erasing unused space...");
    let b = stepped.add_leaf(0.1, "Erasing directory structures...");

    a.set_total(100);
    a.set_completed(50);
    b.mark_complete();

    assert!((stepped.ratio() - (0.45 + 0.1)).abs() < EPSILON);
}

#[test]
fn test_zero_weight_step_contributes_nothing() {
    let stepped = SteppedProgressManager::new();
    let search = stepped.add_leaf(0.0, "Searching for files' cluster tips...");
    search.mark_complete();

    assert_eq!(stepped.ratio(), 0.0);
    assert_eq!(stepped.len(), 1);
}

#[test]
fn test_steps_appended_mid_run_keep_prior_weights() {
    let stepped = SteppedProgressManager::new();
    let first = stepped.add_leaf(0.8, "fill");
    first.mark_complete();
    let before = stepped.ratio();

    let second = stepped.add_leaf(0.05, "resident");
    assert!((stepped.ratio() - before).abs() < EPSILON);

    second.mark_complete();
    assert!((stepped.ratio() - 0.85).abs() < EPSILON);
    assert!((stepped.total_weight() - 0.85).abs() < EPSILON);
}

#[test]
fn test_nested_stepped_managers() {
    let task = SteppedProgressManager::new();
    let target_a = Arc::new(SteppedProgressManager::new());
    let target_b = Arc::new(SteppedProgressManager::new());
    task.add_step(ProgressStep::new(target_a.clone(), 0.5, "a"));
    task.add_step(ProgressStep::new(target_b.clone(), 0.5, "b"));

    let leaf = target_a.add_leaf(1.0, "fill");
    leaf.set_total(4);
    leaf.set_completed(2);
    assert!((task.ratio() - 0.25).abs() < EPSILON);

    target_a.mark_complete();
    assert!((task.ratio() - 0.5).abs() < EPSILON);
}

#[test]
fn test_stepped_mark_complete_forces_one() {
    let stepped = SteppedProgressManager::new();
    let _leaf = stepped.add_leaf(0.9, "fill");
    stepped.mark_complete();
    assert_eq!(stepped.ratio(), 1.0);
}

#[test]
fn test_negative_weight_is_clamped() {
    let step = ProgressStep::new(Arc::new(ProgressManager::new()), -0.5, "bogus");
    assert_eq!(step.weight, 0.0);
}

// ==================== PROPERTY TESTS ====================

#[derive(Debug, Clone)]
enum Update {
    Add(u64),
    Total(u64),
    NewStep(u8),
}

fn update_strategy() -> impl Strategy<Value = Update> {
    prop_oneof![
        (0u64..10_000).prop_map(Update::Add),
        (0u64..100_000).prop_map(Update::Total),
        (0u8..=10).prop_map(Update::NewStep),
    ]
}

proptest! {
    #[test]
    fn prop_aggregate_ratio_is_monotonic(
        updates in prop::collection::vec(update_strategy(), 1..200),
    ) {
        let stepped = SteppedProgressManager::new();
        let mut current = stepped.add_leaf(0.1, "initial");
        let mut last = stepped.ratio();

        for update in updates {
            match update {
                Update::Add(n) => { current.add_completed(n); }
                Update::Total(t) => current.set_total(t),
                Update::NewStep(w) => current = stepped.add_leaf(f32::from(w) / 100.0, "step"),
            }
            let ratio = stepped.ratio();
            prop_assert!(ratio + EPSILON >= last, "ratio fell from {} to {}", last, ratio);
            prop_assert!((0.0..=1.0).contains(&ratio));
            last = ratio;
        }

        stepped.mark_complete();
        prop_assert_eq!(stepped.ratio(), 1.0);
        current.add_completed(1);
        prop_assert_eq!(stepped.ratio(), 1.0);
    }

    #[test]
    fn prop_leaf_ratio_never_exceeds_one(
        completed in 0u64..u64::MAX / 2,
        total in 0u64..u64::MAX / 2,
    ) {
        let manager = ProgressManager::with_total(total);
        manager.set_completed(completed);
        let ratio = manager.ratio();
        prop_assert!((0.0..=1.0).contains(&ratio));
    }
}
