/// Error classification for the task reporting layer
///
/// The erasure pipeline only distinguishes three outcomes: a fault that may clear up
/// on its own, a fault that ends the target, and a cooperative cancellation. The
/// class decides how the task records the outcome in its log.
use crate::task::LogLevel;
use crate::WipeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of errors for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Transient errors - recovered locally, never surfaced
    /// Examples: allocation above the one-cluster floor
    Transient,

    /// Fatal errors - the target fails after cleanup
    /// Examples: allocation exhausted, device removed, permission revoked mid-run
    Fatal,

    /// User interrupted - normal abort path, not an error
    UserInterrupted,
}

impl ErrorClass {
    /// Severity the task log records this class at
    pub fn log_level(&self) -> LogLevel {
        match self {
            ErrorClass::Transient => LogLevel::Warning,
            ErrorClass::Fatal => LogLevel::Error,
            ErrorClass::UserInterrupted => LogLevel::Information,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "Transient"),
            ErrorClass::Fatal => write!(f, "Fatal"),
            ErrorClass::UserInterrupted => write!(f, "UserInterrupted"),
        }
    }
}

/// Error classifier - maps a [`WipeError`] to its [`ErrorClass`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &WipeError) -> ErrorClass {
        match error {
            WipeError::Canceled => ErrorClass::UserInterrupted,

            // Every fault that reaches the task already ended its target
            WipeError::Io(_)
            | WipeError::InsufficientPrivileges(_)
            | WipeError::AllocationExhausted { .. }
            | WipeError::FillStalled(_)
            | WipeError::UnknownMethod(_)
            | WipeError::UnsupportedMethod(_)
            | WipeError::VolumeNotFound(_)
            | WipeError::Prng(_)
            | WipeError::Config(_) => ErrorClass::Fatal,
        }
    }

    /// Suggested operator action for an error, if any
    pub fn suggestion(&self, error: &WipeError) -> Option<&'static str> {
        match error {
            WipeError::InsufficientPrivileges(_) => {
                Some("Run the program as root (or with sudo) and retry the operation")
            }
            WipeError::AllocationExhausted { .. } => {
                Some("The volume is full; unused space has already been consumed")
            }
            WipeError::UnsupportedMethod(_) | WipeError::UnknownMethod(_) => {
                Some("Pick a method from `sayonara-freespace methods`")
            }
            WipeError::FillStalled(_) => {
                Some("The filesystem may be compressing or deduplicating the fill data")
            }
            _ => None,
        }
    }
}
