//! Terminal rendering of task progress.

pub mod progress;


pub use progress::{ProgressBar, TerminalSink};
