//! Tasks: the owning unit of cancellable work.
//!
//! A [`Task`] runs its erasure targets sequentially on the calling thread. Each
//! target contributes one step of weight `1 / target_count` to the task's
//! aggregate progress. Cancellation is cooperative: every progress callback polls
//! the task's [`CancellationToken`].

use crate::config::TaskConfig;
use crate::error::{ErrorClass, ErrorClassifier};
use crate::progress::{
    Progress, ProgressDetail, ProgressEvent, ProgressSink, SteppedProgressManager,
};
use crate::targets::{ErasureTarget, Services};
use crate::{WipeError, WipeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Cooperative cancellation flag shared between the worker and its controller.
///
/// Also trips when the process-wide interrupt flag is set (Ctrl+C).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst) || crate::is_interrupted()
    }

    /// `Err(WipeError::Canceled)` once cancellation was requested
    pub fn check(&self) -> WipeResult<()> {
        if self.is_canceled() {
            Err(WipeError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Information,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Information => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Operator-facing log of a task run
#[derive(Debug, Default)]
pub struct TaskLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl TaskLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Information => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Information, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Highest severity recorded so far
    pub fn highest_level(&self) -> Option<LogLevel> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|e| e.level)
            .max()
    }
}

/// Everything a target needs from its owning task while executing
pub struct TaskContext<'a> {
    pub cancel: &'a CancellationToken,
    pub steps: &'a SteppedProgressManager,
    pub target_count: usize,
    pub log: &'a TaskLog,
    pub sink: &'a dyn ProgressSink,
}

impl TaskContext<'_> {
    pub fn check_canceled(&self) -> WipeResult<()> {
        self.cancel.check()
    }

    /// Forward a progress change to the sink
    pub fn report(&self, label: &str, progress: &dyn Progress, detail: &ProgressDetail) {
        self.sink.progress_changed(&ProgressEvent {
            label,
            progress,
            detail,
        });
    }

    /// Weight of one target inside the task
    pub fn target_share(&self) -> f32 {
        1.0 / self.target_count.max(1) as f32
    }
}

pub struct Task {
    id: Uuid,
    name: String,
    targets: Vec<Box<dyn ErasureTarget>>,
    cancel: CancellationToken,
    progress: Arc<SteppedProgressManager>,
    log: Arc<TaskLog>,
}

impl Task {
    pub fn new(name: impl Into<String>, targets: Vec<Box<dyn ErasureTarget>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            targets,
            cancel: CancellationToken::new(),
            progress: Arc::new(SteppedProgressManager::new()),
            log: Arc::new(TaskLog::new()),
        }
    }

    /// Build a task from its configuration record
    pub fn from_config(config: TaskConfig, services: &Services) -> WipeResult<Self> {
        config.validate()?;
        let targets = config
            .targets
            .into_iter()
            .map(|t| t.into_target(services))
            .collect::<WipeResult<Vec<_>>>()?;
        Ok(Self::new(config.name, targets))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn targets(&self) -> &[Box<dyn ErasureTarget>] {
        &self.targets
    }

    /// Handle that can cancel this task from another thread
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// Aggregate progress tree (one step per executed target)
    pub fn progress(&self) -> Arc<SteppedProgressManager> {
        self.progress.clone()
    }

    pub fn log(&self) -> Arc<TaskLog> {
        self.log.clone()
    }

    /// Run every target in order.
    ///
    /// Cancellation stops the task immediately. Any other failure is logged and the
    /// remaining targets still run; the first failure is returned at the end.
    pub fn execute(&mut self, sink: &dyn ProgressSink) -> WipeResult<()> {
        let classifier = ErrorClassifier::new();
        let target_count = self.targets.len();
        let mut failure: Option<WipeError> = None;

        self.log.info(format!("Task '{}' ({}) started", self.name, self.id));

        for target in self.targets.iter_mut() {
            let ctx = TaskContext {
                cancel: &self.cancel,
                steps: &self.progress,
                target_count,
                log: &self.log,
                sink,
            };

            if let Err(e) = ctx.check_canceled().and_then(|()| target.execute(&ctx)) {
                let class = classifier.classify(&e);
                match classifier.suggestion(&e) {
                    Some(hint) => self.log.log(
                        class.log_level(),
                        format!("{}: {} ({})", target.ui_text(), e, hint),
                    ),
                    None => self
                        .log
                        .log(class.log_level(), format!("{}: {}", target.ui_text(), e)),
                }

                if class == ErrorClass::UserInterrupted {
                    return Err(e);
                }
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                self.progress.mark_complete();
                self.log.info(format!("Task '{}' completed", self.name));
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("targets", &self.targets.len())
            .field("canceled", &self.canceled())
            .finish()
    }
}
