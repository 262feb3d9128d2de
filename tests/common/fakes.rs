use sayonara_freespace::algorithms::ErasureMethod;
use sayonara_freespace::crypto::Prng;
use sayonara_freespace::filesystem::FileSystem;
use sayonara_freespace::platform::Platform;
use sayonara_freespace::progress::{Progress, ProgressDetail, ProgressEvent, ProgressSink};
use sayonara_freespace::volume::Volume;
use sayonara_freespace::{CancellationToken, WipeResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Platform double with an observable notification setting
#[derive(Debug)]
pub struct FakePlatform {
    pub elevated: bool,
    pub restore_points: bool,
    notifications: AtomicBool,
    /// Every value written through `set_low_disk_space_notifications`
    pub changes: Mutex<Vec<bool>>,
}

impl FakePlatform {
    pub fn new(notifications: bool) -> Arc<Self> {
        Arc::new(Self {
            elevated: true,
            restore_points: false,
            notifications: AtomicBool::new(notifications),
            changes: Mutex::new(Vec::new()),
        })
    }

    pub fn with_restore_points() -> Arc<Self> {
        Arc::new(Self {
            elevated: true,
            restore_points: true,
            notifications: AtomicBool::new(true),
            changes: Mutex::new(Vec::new()),
        })
    }

    pub fn unprivileged() -> Arc<Self> {
        Arc::new(Self {
            elevated: false,
            restore_points: false,
            notifications: AtomicBool::new(true),
            changes: Mutex::new(Vec::new()),
        })
    }

    pub fn notifications(&self) -> bool {
        self.notifications.load(Ordering::SeqCst)
    }

    pub fn changes(&self) -> Vec<bool> {
        self.changes.lock().unwrap().clone()
    }
}

impl Platform for FakePlatform {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn has_restore_points(&self, _mount_point: &Path) -> bool {
        self.restore_points
    }

    fn low_disk_space_notifications(&self) -> bool {
        self.notifications()
    }

    fn set_low_disk_space_notifications(&self, enabled: bool) {
        self.changes.lock().unwrap().push(enabled);
        self.notifications.store(enabled, Ordering::SeqCst);
    }
}

/// One progress event as observed by [`RecordingSink`]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub label: String,
    pub step_ratio: f32,
    pub overall_ratio: f32,
    pub detail: ProgressDetail,
}

/// Records every event together with the aggregate ratio at that moment.
///
/// Optionally cancels a token the first time a given label is reported.
#[derive(Debug, Default)]
pub struct RecordingSink {
    overall: Mutex<Option<Arc<dyn Progress>>>,
    trip: Mutex<Option<(String, CancellationToken)>>,
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the ratio of `overall` (usually the task's progress) on every event
    pub fn observe(self, overall: Arc<dyn Progress>) -> Self {
        *self.overall.lock().unwrap() = Some(overall);
        self
    }

    /// Cancel `token` when an event with `label` arrives
    pub fn cancel_on(self, label: &str, token: CancellationToken) -> Self {
        *self.trip.lock().unwrap() = Some((label.to_string(), token));
        self
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for event in self.events() {
            if labels.last() != Some(&event.label) {
                labels.push(event.label);
            }
        }
        labels
    }

    pub fn overall_ratios(&self) -> Vec<f32> {
        self.events().iter().map(|e| e.overall_ratio).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn progress_changed(&self, event: &ProgressEvent<'_>) {
        let overall_ratio = self
            .overall
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.ratio())
            .unwrap_or(0.0);
        self.events.lock().unwrap().push(Recorded {
            label: event.label.to_string(),
            step_ratio: event.progress.ratio(),
            overall_ratio,
            detail: event.detail.clone(),
        });

        if let Some((label, token)) = self.trip.lock().unwrap().as_ref() {
            if label == event.label {
                token.cancel();
            }
        }
    }
}

/// Filesystem double: reports a fixed number of items per phase and records the
/// phases it was asked to run
#[derive(Debug)]
pub struct StubFileSystem {
    pub tip_files: usize,
    pub resident_files: usize,
    pub directories: usize,
    pub calls: Mutex<Vec<&'static str>>,
}

impl StubFileSystem {
    pub fn new() -> Arc<Self> {
        Self::with_counts(3, 2, 2)
    }

    pub fn with_counts(tip_files: usize, resident_files: usize, directories: usize) -> Arc<Self> {
        Arc::new(Self {
            tip_files,
            resident_files,
            directories,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, phase: &'static str) {
        self.calls.lock().unwrap().push(phase);
    }
}

impl FileSystem for StubFileSystem {
    fn name(&self) -> &str {
        "stub"
    }

    fn erase_cluster_tips(
        &self,
        volume: &dyn Volume,
        _method: &dyn ErasureMethod,
        _prng: &mut dyn Prng,
        on_search: &mut dyn FnMut(&Path) -> WipeResult<()>,
        on_erase: &mut dyn FnMut(usize, usize, &Path) -> WipeResult<()>,
    ) -> WipeResult<()> {
        self.record("cluster_tips");
        let files: Vec<PathBuf> = (0..self.tip_files)
            .map(|i| volume.mount_point().join(format!("file{}", i)))
            .collect();
        for file in &files {
            on_search(file)?;
        }
        for (i, file) in files.iter().enumerate() {
            on_erase(i, files.len(), file)?;
        }
        Ok(())
    }

    fn erase_old_resident_files(
        &self,
        _volume: &dyn Volume,
        work_dir: &Path,
        _method: &dyn ErasureMethod,
        _prng: &mut dyn Prng,
        on_progress: &mut dyn FnMut(usize, usize) -> WipeResult<()>,
    ) -> WipeResult<()> {
        self.record("resident_files");
        assert!(work_dir.is_dir(), "resident files run inside the working directory");
        for i in 0..self.resident_files {
            on_progress(i + 1, self.resident_files)?;
        }
        Ok(())
    }

    fn erase_directory_structures(
        &self,
        _volume: &dyn Volume,
        on_progress: &mut dyn FnMut(usize, usize) -> WipeResult<()>,
    ) -> WipeResult<()> {
        self.record("directory_structures");
        for i in 0..self.directories {
            on_progress(i + 1, self.directories)?;
        }
        Ok(())
    }
}
