// Allow complex types where needed for progress callbacks and capability registries
#![allow(clippy::type_complexity)]

pub mod algorithms;
pub mod config;
pub mod crypto;
pub mod error;
pub mod filesystem;
pub mod platform;
pub mod progress;
pub mod targets;
pub mod task;
pub mod ui;
pub mod volume;

// Re-export the main entry points for convenience
pub use config::{Settings, TaskConfig};
pub use progress::{ProgressManager, SteppedProgressManager};
pub use targets::{ErasureTarget, Services, TargetConfig, UnusedSpaceConfig, UnusedSpaceTarget};
pub use task::{CancellationToken, Task};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

// Global flag for handling Ctrl+C interrupts
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Set the interrupt flag (called by signal handler)
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Check if an interrupt has been received
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Reset the interrupt flag (primarily for testing)
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

#[derive(Error, Debug)]
pub enum WipeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Insufficient permissions: {0}")]
    InsufficientPrivileges(String),

    #[error("No usable space left on the volume: allocating {length} bytes for {} failed: {source}", path.display())]
    AllocationExhausted {
        path: PathBuf,
        length: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Free space stopped decreasing on {0} while filling")]
    FillStalled(String),

    #[error("Unknown erasure method: {0}")]
    UnknownMethod(String),

    #[error("Erasure method {0} cannot erase unused space")]
    UnsupportedMethod(String),

    #[error("Volume not found: {0}")]
    VolumeNotFound(String),

    #[error("Random number generator failed: {0}")]
    Prng(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("The task was cancelled")]
    Canceled,
}

// Manual Clone implementation because std::io::Error doesn't implement Clone
impl Clone for WipeError {
    fn clone(&self) -> Self {
        match self {
            WipeError::Io(e) => WipeError::Io(std::io::Error::new(e.kind(), e.to_string())),
            WipeError::InsufficientPrivileges(s) => WipeError::InsufficientPrivileges(s.clone()),
            WipeError::AllocationExhausted {
                path,
                length,
                source,
            } => WipeError::AllocationExhausted {
                path: path.clone(),
                length: *length,
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            WipeError::FillStalled(s) => WipeError::FillStalled(s.clone()),
            WipeError::UnknownMethod(s) => WipeError::UnknownMethod(s.clone()),
            WipeError::UnsupportedMethod(s) => WipeError::UnsupportedMethod(s.clone()),
            WipeError::VolumeNotFound(s) => WipeError::VolumeNotFound(s.clone()),
            WipeError::Prng(s) => WipeError::Prng(s.clone()),
            WipeError::Config(s) => WipeError::Config(s.clone()),
            WipeError::Canceled => WipeError::Canceled,
        }
    }
}

impl From<::config::ConfigError> for WipeError {
    fn from(err: ::config::ConfigError) -> Self {
        WipeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for WipeError {
    fn from(err: serde_json::Error) -> Self {
        WipeError::Config(err.to_string())
    }
}

pub type WipeResult<T> = Result<T, WipeError>;
