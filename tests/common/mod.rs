//! Common test utilities for the integration tests
//!
//! This module provides:
//! - A simulated volume with live free-space accounting and injectable allocation failures
//! - A recording progress sink that can trip cancellation on a given step label
//! - A fake platform and a stub filesystem that record how they were driven
#![allow(dead_code)]

pub mod fakes;
pub mod simulated_volume;

pub use fakes::{FakePlatform, RecordingSink, StubFileSystem};
pub use simulated_volume::{AllocationPlan, SimulatedVolume};

use sayonara_freespace::algorithms::MethodRegistry;
use sayonara_freespace::filesystem::{FileSystem, FileSystemRegistry};
use sayonara_freespace::{Services, Settings};
use std::sync::Arc;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * 1024;

/// Services wired to a simulated volume, a fake platform and `filesystem`
pub fn services(
    volume: &SimulatedVolume,
    platform: &Arc<FakePlatform>,
    filesystem: Arc<dyn FileSystem>,
    settings: Settings,
) -> Services {
    Services {
        platform: platform.clone(),
        volumes: Arc::new(volume.resolver()),
        filesystems: Arc::new(FileSystemRegistry::new(filesystem)),
        methods: Arc::new(MethodRegistry::with_builtin()),
        settings: Arc::new(settings),
    }
}

/// Settings with the given fill unit and method
pub fn settings(fill_unit: u64, method: &str) -> Settings {
    Settings {
        default_unused_space_method: method.to_string(),
        fill_unit_bytes: fill_unit,
        ..Settings::default()
    }
}
