use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix marking a file still being downloaded
pub const PARTIAL_SUFFIX: &str = ".incomplete";

/// One artifact to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadTask {
    pub source_url: String,
    pub destination: PathBuf,
}

impl DownloadTask {
    /// Task fetching `url_prefix + basename(destination)`
    #[must_use]
    pub fn new(url_prefix: &str, destination: PathBuf) -> Self {
        let basename = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            source_url: format!("{url_prefix}{basename}"),
            destination,
        }
    }

    /// Filename shown in progress and failure reports
    #[must_use]
    pub fn file_name(&self) -> String {
        self.destination
            .file_name()
            .map_or_else(|| self.destination.display().to_string(), |name| {
                name.to_string_lossy().into_owned()
            })
    }

    /// Temporary file the body is streamed into before the final rename
    #[must_use]
    pub fn partial_path(&self) -> PathBuf {
        partial_path(&self.destination)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Final result of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Written(u64),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDownload {
    pub task: DownloadTask,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub task: DownloadTask,
    pub reason: String,
}

/// Overall shape of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No tasks were submitted
    NothingToDo,
    Complete,
    /// Some files failed, some succeeded
    Partial,
    Failed,
}

/// Aggregate of a download run, in completion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub task_count: usize,
    pub completed: Vec<CompletedDownload>,
    pub failures: Vec<FailedDownload>,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl FetchReport {
    #[must_use]
    pub fn new(task_count: usize) -> Self {
        Self {
            task_count,
            ..Self::default()
        }
    }

    /// Record a task that reached a final state
    pub fn record(&mut self, task: DownloadTask, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Written(bytes) => {
                self.total_bytes += bytes;
                self.completed.push(CompletedDownload { task, bytes });
            }
            DownloadOutcome::Failed(reason) => {
                self.failures.push(FailedDownload { task, reason });
            }
        }
    }

    /// Tasks that reached a final state
    #[must_use]
    pub fn finished(&self) -> usize {
        self.completed.len() + self.failures.len()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.finished() == self.task_count
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        if self.task_count == 0 {
            RunStatus::NothingToDo
        } else if self.failures.is_empty() {
            RunStatus::Complete
        } else if self.completed.is_empty() {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        }
    }

    /// Bytes per second over the run so far
    #[must_use]
    pub fn throughput(&self) -> f64 {
        throughput(self.total_bytes, self.elapsed)
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn throughput(bytes: u64, elapsed: Duration) -> f64 {
    // Avoid dividing by zero on instant completions
    let secs = elapsed.as_secs_f64().max(1e-5);
    bytes as f64 / secs
}

/// Notification sent after each task reaches a final state
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    pub task: &'a DownloadTask,
    pub outcome: &'a DownloadOutcome,
    pub total_bytes: u64,
    pub elapsed: Duration,
    pub failures: usize,
    pub finished: usize,
    pub task_count: usize,
}

impl ProgressEvent<'_> {
    #[must_use]
    pub fn throughput(&self) -> f64 {
        throughput(self.total_bytes, self.elapsed)
    }
}

/// Receives progress notifications in completion order
pub trait ProgressObserver {
    fn on_complete(&mut self, event: &ProgressEvent<'_>);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressEvent<'_>),
{
    fn on_complete(&mut self, event: &ProgressEvent<'_>) {
        self(event);
    }
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
