use crate::progress::{Progress, ProgressEvent, ProgressSink};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub(crate) const SPINNER_FRAMES: [&str; 4] = ["·", "˚", "•", "˚"];

/// Minimum time between two redraws of the terminal line
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Single-line progress bar with elapsed time and an estimate of the time left
pub struct ProgressBar {
    width: usize,
    frame: usize,
    start: Instant,
}

impl ProgressBar {
    /// width = number of bar character slots (not including the brackets)
    pub fn new(width: usize) -> Self {
        Self {
            width,
            frame: 0,
            start: Instant::now(),
        }
    }

    /// Build one line for `ratio` (0.0..=1.0) plus the step label and detail
    pub fn line(&mut self, ratio: f32, label: &str, detail: &str) -> String {
        let ratio = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
        let filled = ((ratio as f64) * self.width as f64).round() as usize;
        let empty = self.width.saturating_sub(filled);

        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();

        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));
        let eta = match time_left(self.start.elapsed(), ratio) {
            Some(left) => format_duration(left.as_secs()),
            None => "--:--".to_string(),
        };

        let mut line = format!(
            "[{}] {:>5.1}%  ETA {}  {} {}",
            bar,
            ratio * 100.0,
            eta,
            SPINNER_FRAMES[self.frame],
            label
        );
        if !detail.is_empty() {
            line.push_str(" (");
            line.push_str(detail);
            line.push(')');
        }
        line
    }

    /// Redraw the current terminal line
    pub fn render(&mut self, ratio: f32, label: &str, detail: &str) {
        let line = self.line(ratio, label, detail);
        let mut out = io::stdout().lock();
        // \x1b[2K clears the line before the carriage return rewrites it
        let _ = write!(out, "\x1b[2K\r{}", line);
        let _ = out.flush();
    }

    /// Move past the bar once rendering is done
    pub fn finish(&mut self) {
        let elapsed =
            humantime::format_duration(Duration::from_secs(self.start.elapsed().as_secs()));
        println!("\nFinished in {}", elapsed);
    }
}

/// Remaining time, extrapolated from the elapsed time and completion ratio
pub(crate) fn time_left(elapsed: Duration, ratio: f32) -> Option<Duration> {
    if ratio <= 0.0 || ratio.is_nan() {
        return None;
    }
    if ratio >= 1.0 {
        return Some(Duration::ZERO);
    }
    let total = elapsed.as_secs_f64() / ratio as f64;
    Some(Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0)))
}

/// Convert a byte count to a readable string
pub fn human_bytes(bytes: f64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    if bytes <= 0.0 {
        return "0B".to_string();
    }
    let mut val = bytes;
    let mut i = 0usize;
    while val >= 1024.0 && i + 1 < units.len() {
        val /= 1024.0;
        i += 1;
    }
    format!("{:.2}{}", val, units[i])
}

/// Format seconds to H:MM:SS or M:SS
pub(crate) fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

struct SinkState {
    bar: ProgressBar,
    last_draw: Option<Instant>,
}

/// [`ProgressSink`] that draws the task's aggregate progress on stdout.
///
/// Events arrive from the worker thread; redraws are throttled to
/// [`REDRAW_INTERVAL`] so the sink stays cheap.
pub struct TerminalSink {
    overall: Arc<dyn Progress>,
    state: Mutex<SinkState>,
}

impl TerminalSink {
    /// `overall` is the tree whose ratio is drawn, usually the task's progress
    pub fn new(overall: Arc<dyn Progress>, width: usize) -> Self {
        Self {
            overall,
            state: Mutex::new(SinkState {
                bar: ProgressBar::new(width),
                last_draw: None,
            }),
        }
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.bar.render(self.overall.ratio(), "Done", "");
        state.bar.finish();
    }
}

/// Detail text for an event: the item plus the pass when the phase has passes
pub(crate) fn describe(event: &ProgressEvent<'_>) -> String {
    let detail = event.detail;
    let mut text = if detail.total_passes > 0 {
        format!(
            "{}, pass {}/{}",
            detail.item, detail.current_pass, detail.total_passes
        )
    } else {
        detail.item.clone()
    };
    if let Some(speed) = event.progress.speed().filter(|s| *s > 0.0) {
        if !text.is_empty() {
            text.push_str(", ");
        }
        text.push_str(&format!("{}/s", human_bytes(speed)));
    }
    if let Some(left) = event.progress.time_left().filter(|l| !l.is_zero()) {
        if !text.is_empty() {
            text.push_str(", ");
        }
        text.push_str(&format!("{} left", format_duration(left.as_secs())));
    }
    text
}

impl ProgressSink for TerminalSink {
    fn progress_changed(&self, event: &ProgressEvent<'_>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if matches!(state.last_draw, Some(last) if now.duration_since(last) < REDRAW_INTERVAL) {
            return;
        }
        state.last_draw = Some(now);
        state
            .bar
            .render(self.overall.ratio(), event.label, &describe(event));
    }
}
