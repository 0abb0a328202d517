use crate::error::{FetchError, Interrupted};
use crate::fetch::report::{
    DownloadOutcome, DownloadTask, FetchReport, ProgressEvent, ProgressObserver,
};
use crate::fetch::retry::RetryPolicy;
use crate::fetch::transport::Transport;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

type Queue = Arc<Mutex<VecDeque<DownloadTask>>>;

/// Downloads artifacts with a fixed number of workers
///
/// Workers pull tasks from a shared queue and send each final result to a
/// single collector, which owns the report and drives the observer. Results
/// are therefore seen in completion order.
#[derive(Clone)]
pub struct FetchEngine {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl FetchEngine {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Run all tasks to completion
    pub async fn run<O>(
        &self,
        tasks: Vec<DownloadTask>,
        concurrency: usize,
        observer: &mut O,
    ) -> FetchReport
    where
        O: ProgressObserver,
    {
        match self
            .run_until(tasks, concurrency, observer, std::future::pending::<()>())
            .await
        {
            Ok(report) | Err(Interrupted { report }) => report,
        }
    }

    /// Run all tasks, or stop early once `cancel` resolves
    ///
    /// On cancellation queued tasks are dropped and in-flight ones aborted
    /// without waiting for them; the partial report travels in the error.
    pub async fn run_until<O, C>(
        &self,
        tasks: Vec<DownloadTask>,
        concurrency: usize,
        observer: &mut O,
        cancel: C,
    ) -> Result<FetchReport, Interrupted>
    where
        O: ProgressObserver,
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let tasks = dedup_destinations(tasks);
        let mut report = FetchReport::new(tasks.len());
        if tasks.is_empty() {
            tracing::info!("No missing model files to download");
            return Ok(report);
        }

        let workers = concurrency.clamp(1, tasks.len());
        tracing::info!("Downloading {} files with {workers} workers", tasks.len());

        let mut pending: HashMap<PathBuf, DownloadTask> = tasks
            .iter()
            .map(|task| (task.destination.clone(), task.clone()))
            .collect();
        let queue: Queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (result_tx, mut result_rx) = mpsc::channel(workers);

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let result_tx = result_tx.clone();
            let transport = Arc::clone(&self.transport);
            let policy = self.policy.clone();

            pool.spawn(async move {
                while let Some(task) = next_task(&queue) {
                    let outcome = match download(transport.as_ref(), &policy, &task).await {
                        Ok(bytes) => DownloadOutcome::Written(bytes),
                        Err(e) => {
                            tracing::error!("Download of {} failed: {e}", task.file_name());
                            DownloadOutcome::Failed(e.to_string())
                        }
                    };
                    if result_tx.send((task, outcome)).await.is_err() {
                        break;
                    }
                }
                tracing::debug!("Worker {worker} finished");
            });
        }
        drop(result_tx);

        tokio::pin!(cancel);
        loop {
            tokio::select! {
                biased;

                () = &mut cancel => {
                    pool.abort_all();
                    report.elapsed = started.elapsed();
                    tracing::warn!(
                        "Download interrupted, {} of {} files finished",
                        report.finished(),
                        report.task_count
                    );
                    return Err(Interrupted { report });
                }

                received = result_rx.recv() => {
                    let Some((task, outcome)) = received else { break };
                    pending.remove(&task.destination);
                    report.elapsed = started.elapsed();
                    notify(observer, &mut report, task, outcome);
                }
            }
        }

        // A worker that panicked never reported its task
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Download worker crashed: {e}");
            }
        }
        for task in pending.into_values() {
            notify(
                observer,
                &mut report,
                task,
                DownloadOutcome::Failed("download worker crashed".to_string()),
            );
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            "Downloaded {} of {} files ({} bytes) in {:.1}s",
            report.completed.len(),
            report.task_count,
            report.total_bytes,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

// Two tasks writing the same destination would share a partial file
fn dedup_destinations(tasks: Vec<DownloadTask>) -> Vec<DownloadTask> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            let fresh = seen.insert(task.destination.clone());
            if !fresh {
                tracing::debug!("Ignoring duplicate task for {}", task.destination.display());
            }
            fresh
        })
        .collect()
}

fn next_task(queue: &Queue) -> Option<DownloadTask> {
    match queue.lock() {
        Ok(mut queue) => queue.pop_front(),
        Err(_) => None,
    }
}

fn notify<O: ProgressObserver>(
    observer: &mut O,
    report: &mut FetchReport,
    task: DownloadTask,
    outcome: DownloadOutcome,
) {
    report.record(task.clone(), outcome.clone());

    observer.on_complete(&ProgressEvent {
        task: &task,
        outcome: &outcome,
        total_bytes: report.total_bytes,
        elapsed: report.elapsed,
        failures: report.failures.len(),
        finished: report.finished(),
        task_count: report.task_count,
    });
}

/// Fetch one task with retries
pub async fn download(
    transport: &dyn Transport,
    policy: &RetryPolicy,
    task: &DownloadTask,
) -> Result<u64, FetchError> {
    let label = task.file_name();
    let bytes = policy
        .retry(&label, || fetch_once(transport, task))
        .await?;
    tracing::debug!("Downloaded {label} ({bytes} bytes)");
    Ok(bytes)
}

/// One attempt: stream into the partial file, verify length, rename into place
async fn fetch_once(transport: &dyn Transport, task: &DownloadTask) -> Result<u64, FetchError> {
    let mut body = transport.get(&task.source_url).await?;
    let expected = body.content_length();

    if let Some(parent) = task.destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let partial = task.partial_path();
    let mut file = fs::File::create(&partial).await?;
    let mut written = 0u64;

    while let Some(chunk) = body.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if let Some(expected) = expected {
        if expected != written {
            return Err(FetchError::ShortContent {
                expected,
                received: written,
            });
        }
    }

    fs::rename(&partial, &task.destination).await?;
    Ok(written)
}
