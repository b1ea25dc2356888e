//! Progress reporting for in-flight downloads.
//!
//! The download engine talks to a [`ProgressSink`]; it never renders
//! anything itself. [`TerminalProgress`] draws one indicatif bar per task
//! (name, bar, percentage, bytes, speed, ETA). [`RecordingProgress`] keeps
//! an in-memory event log for headless runs and tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Opaque handle identifying one task within a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Raw numeric id, unique within the sink that issued it.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Receiver of per-task progress updates.
///
/// Implementations are shared by every concurrent download task and must
/// serialize their own state.
pub trait ProgressSink: Send + Sync {
    /// Registers a task that has not started transferring yet.
    fn add_task(&self, display_name: &str) -> TaskId;

    /// Changes the name shown for a task.
    fn set_name(&self, task: TaskId, display_name: &str);

    /// Marks the task as transferring; elapsed time and ETA start here.
    fn start(&self, task: TaskId);

    /// Sets the total size when `total` is known and advances by `advance` bytes.
    fn update(&self, task: TaskId, total: Option<u64>, advance: u64);

    /// Deregisters a task. Unknown ids are ignored.
    fn remove_task(&self, task: TaskId);

    /// Prints a line above the progress display.
    fn log(&self, message: &str);

    /// Prints a failure line. Unlike [`ProgressSink::log`], quiet sinks
    /// must still show it.
    fn error(&self, message: &str) {
        self.log(message);
    }
}

const NAME_COLUMN: &str = "{msg:>28.bold.blue}";

fn pending_style() -> ProgressStyle {
    ProgressStyle::with_template(&format!("{NAME_COLUMN} waiting"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn determinate_style() -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{NAME_COLUMN} {{wide_bar}} {{percent:>3}}% • {{bytes}}/{{total_bytes}} • {{bytes_per_sec}} • {{eta}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn indeterminate_style() -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{NAME_COLUMN} {{spinner}} {{bytes}} • {{bytes_per_sec}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

struct Row {
    bar: ProgressBar,
    started: bool,
}

/// Terminal progress display built on an indicatif [`MultiProgress`].
///
/// Bars draw to stderr. When stderr is not a terminal, indicatif hides the
/// bars and [`ProgressSink::log`] falls back to plain stderr lines.
pub struct TerminalProgress {
    multi: MultiProgress,
    rows: Mutex<HashMap<TaskId, Row>>,
    next_id: AtomicU64,
    silent: bool,
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalProgress {
    /// Creates a display drawing to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr(), false)
    }

    /// Creates a display that draws nothing and only prints failures (`--quiet`).
    #[must_use]
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden(), true)
    }

    fn with_target(target: ProgressDrawTarget, silent: bool) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            silent,
        }
    }

    /// Number of tasks currently registered.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.lock_rows().len()
    }

    fn lock_rows(&self) -> MutexGuard<'_, HashMap<TaskId, Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_row(&self, task: TaskId, f: impl FnOnce(&mut Row)) {
        if let Some(row) = self.lock_rows().get_mut(&task) {
            f(row);
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn add_task(&self, display_name: &str) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let bar = self.multi.add(
            ProgressBar::no_length()
                .with_style(pending_style())
                .with_message(display_name.to_string()),
        );
        self.lock_rows().insert(id, Row { bar, started: false });
        id
    }

    fn set_name(&self, task: TaskId, display_name: &str) {
        self.with_row(task, |row| row.bar.set_message(display_name.to_string()));
    }

    fn start(&self, task: TaskId) {
        self.with_row(task, |row| {
            row.started = true;
            row.bar.reset_elapsed();
            row.bar.reset_eta();
            if row.bar.length().is_some() {
                row.bar.set_style(determinate_style());
            } else {
                row.bar.set_style(indeterminate_style());
                row.bar.enable_steady_tick(Duration::from_millis(100));
            }
        });
    }

    fn update(&self, task: TaskId, total: Option<u64>, advance: u64) {
        self.with_row(task, |row| {
            if let Some(total) = total {
                row.bar.set_length(total);
                if row.started {
                    row.bar.disable_steady_tick();
                    row.bar.set_style(determinate_style());
                }
            }
            if advance > 0 {
                row.bar.inc(advance);
            }
        });
    }

    fn remove_task(&self, task: TaskId) {
        let removed = self.lock_rows().remove(&task);
        if let Some(row) = removed {
            row.bar.finish_and_clear();
            self.multi.remove(&row.bar);
        }
    }

    fn log(&self, message: &str) {
        if self.silent {
            return;
        }
        if self.multi.is_hidden() || self.multi.println(message).is_err() {
            eprintln!("{message}");
        }
    }

    fn error(&self, message: &str) {
        if self.silent {
            eprintln!("{message}");
        } else {
            self.log(message);
        }
    }
}

/// One call received by a [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `add_task`
    Added { task: TaskId, name: String },
    /// `set_name`
    Renamed { task: TaskId, name: String },
    /// `start`
    Started { task: TaskId },
    /// `update`
    Updated {
        task: TaskId,
        total: Option<u64>,
        advance: u64,
    },
    /// `remove_task`
    Removed { task: TaskId },
    /// `log`
    Logged(String),
}

#[derive(Default)]
struct Recording {
    events: Vec<ProgressEvent>,
    started: HashSet<TaskId>,
    max_started: usize,
    next_id: u64,
}

/// Headless sink that records every call, for embedding and tests.
///
/// Besides the raw event log it tracks how many tasks were started and not
/// yet removed at once, which bounds the number of simultaneously open streams.
#[derive(Default)]
pub struct RecordingProgress {
    state: Mutex<Recording>,
}

impl RecordingProgress {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all events so far, in call order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.lock().events.clone()
    }

    /// Lines passed to [`ProgressSink::log`].
    #[must_use]
    pub fn logs(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Logged(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest number of started, not yet removed tasks seen at any instant.
    #[must_use]
    pub fn max_concurrent_started(&self) -> usize {
        self.lock().max_started
    }

    /// Sum of `advance` values reported for `task`.
    #[must_use]
    pub fn advanced(&self, task: TaskId) -> u64 {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Updated { task: t, advance, .. } if *t == task => Some(*advance),
                _ => None,
            })
            .sum()
    }
}

impl ProgressSink for RecordingProgress {
    fn add_task(&self, display_name: &str) -> TaskId {
        let mut state = self.lock();
        let task = TaskId(state.next_id);
        state.next_id += 1;
        state.events.push(ProgressEvent::Added {
            task,
            name: display_name.to_string(),
        });
        task
    }

    fn set_name(&self, task: TaskId, display_name: &str) {
        self.lock().events.push(ProgressEvent::Renamed {
            task,
            name: display_name.to_string(),
        });
    }

    fn start(&self, task: TaskId) {
        let mut state = self.lock();
        state.events.push(ProgressEvent::Started { task });
        state.started.insert(task);
        state.max_started = state.max_started.max(state.started.len());
    }

    fn update(&self, task: TaskId, total: Option<u64>, advance: u64) {
        self.lock().events.push(ProgressEvent::Updated {
            task,
            total,
            advance,
        });
    }

    fn remove_task(&self, task: TaskId) {
        let mut state = self.lock();
        state.events.push(ProgressEvent::Removed { task });
        state.started.remove(&task);
    }

    fn log(&self, message: &str) {
        self.lock()
            .events
            .push(ProgressEvent::Logged(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_progress_hidden_lifecycle() {
        let progress = TerminalProgress::hidden();
        let a = progress.add_task("a.bin");
        let b = progress.add_task("b.bin");
        assert_ne!(a, b);
        assert_eq!(progress.active_tasks(), 2);

        progress.update(a, Some(100), 0);
        progress.start(a);
        progress.update(a, None, 40);
        progress.set_name(a, "renamed.bin");
        progress.start(b);
        progress.update(b, None, 10);
        progress.log("ignored while hidden");

        progress.remove_task(a);
        progress.remove_task(b);
        progress.remove_task(b);
        assert_eq!(progress.active_tasks(), 0);
    }

    #[test]
    fn test_terminal_progress_unknown_task_is_ignored() {
        let progress = TerminalProgress::hidden();
        let task = progress.add_task("x");
        progress.remove_task(task);
        progress.update(task, Some(1), 1);
        progress.start(task);
        assert_eq!(progress.active_tasks(), 0);
    }

    #[test]
    fn test_recording_progress_tracks_events_and_concurrency() {
        let progress = RecordingProgress::new();
        let a = progress.add_task("a");
        let b = progress.add_task("b");
        progress.start(a);
        progress.update(a, Some(10), 4);
        progress.update(a, None, 6);
        progress.start(b);
        progress.remove_task(a);
        progress.remove_task(b);
        progress.log("done");

        assert_eq!(progress.advanced(a), 10);
        assert_eq!(progress.advanced(b), 0);
        assert_eq!(progress.max_concurrent_started(), 2);
        assert_eq!(progress.logs(), vec!["done".to_string()]);
        assert_eq!(
            progress.events().first(),
            Some(&ProgressEvent::Added {
                task: a,
                name: "a".to_string()
            })
        );
    }

    #[test]
    fn test_error_lines_reach_the_log_by_default() {
        let progress = RecordingProgress::new();
        progress.error("Failed to download 'x': boom");
        assert_eq!(progress.logs(), vec!["Failed to download 'x': boom".to_string()]);

        let quiet = TerminalProgress::hidden();
        quiet.log("dropped");
        quiet.error("printed even when quiet");
        assert_eq!(quiet.active_tasks(), 0);
    }
}
