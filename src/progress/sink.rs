use super::Progress;

/// What the worker is touching right now
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressDetail {
    /// Path or drive currently being processed (may be empty)
    pub item: String,
    /// 1-based pass index, 0 when the phase is not pass-based
    pub current_pass: u32,
    pub total_passes: u32,
}

impl ProgressDetail {
    pub fn item(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            ..Default::default()
        }
    }

    pub fn pass(item: impl Into<String>, current_pass: u32, total_passes: u32) -> Self {
        Self {
            item: item.into(),
            current_pass,
            total_passes,
        }
    }
}

/// A progress notification: the step that moved plus what it is working on
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    pub label: &'a str,
    pub progress: &'a dyn Progress,
    pub detail: &'a ProgressDetail,
}

/// Receives progress events synchronously on the worker thread.
///
/// Implementations must return promptly: the pipeline has a single worker and a
/// slow sink stalls it.
pub trait ProgressSink: Send + Sync {
    fn progress_changed(&self, event: &ProgressEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    fn progress_changed(&self, event: &ProgressEvent<'_>) {
        self(event)
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress_changed(&self, _event: &ProgressEvent<'_>) {}
}
