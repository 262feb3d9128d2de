/// Error classification and local recovery for unused-space erasure
///
/// Only one fault is ever recovered locally: an allocation failure while sizing a
/// fill file, which is retried with a smaller length (see [`retry::AllocationRetry`]).
/// Every other fault unwinds to the orchestrator, which guarantees cleanup before
/// the error reaches the task layer.
///
/// ```text
/// ┌──────────────────────────────┐
/// │  Task (logs by ErrorClass)   │
/// └──────────────┬───────────────┘
///                │
///      ┌─────────┴──────────┐
///      ↓                    ↓
/// ┌──────────────┐   ┌───────────────┐
/// │Classification│   │AllocationRetry│
/// └──────────────┘   └───────────────┘
/// ```

pub mod classification;
pub mod retry;

// Re-export main types for convenience
pub use classification::{ErrorClass, ErrorClassifier};
pub use retry::AllocationRetry;
