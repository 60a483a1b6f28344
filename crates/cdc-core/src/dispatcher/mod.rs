//! Turn a workload into materialized outputs.
//!
//! One dispatch loop walks the manifest in order. Cache hits are linked inline;
//! misses become `FetchTask`s on a bounded queue (capacity = concurrency)
//! drained by a fixed pool of worker threads. Workers report a `TaskOutcome`
//! per task on a results channel; the first failure stops new work from being
//! queued and becomes the run's error once in-flight tasks have finished.

mod task;
mod worker;

pub use task::{FetchTask, TaskState};

use crate::checksum::Digest;
use crate::error::RunError;
use crate::fetcher::{self, CurlFetcher, Fetch};
use crate::manifest::{Manifest, WorkloadEntry};
use crate::materialize;
use crate::progress::{Progress, ProgressEvent, RunSummary};
use crate::store::CacheStore;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread;
use worker::{TaskOutcome, Worker};

/// Default number of concurrent downloads.
pub const DEFAULT_CONCURRENCY: usize = 16;
/// Upper bound on worker threads per run.
pub const MAX_CONCURRENCY: usize = 512;

fn check_concurrency(n: usize) -> Result<(), RunError> {
    if n == 0 {
        return Err(RunError::InvalidOptions(
            "concurrency must be at least 1".into(),
        ));
    }
    if n > MAX_CONCURRENCY {
        return Err(RunError::InvalidOptions(format!(
            "concurrency {} exceeds the maximum of {}",
            n, MAX_CONCURRENCY
        )));
    }
    Ok(())
}

/// Everything `run_workload` needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub manifest: PathBuf,
    /// Blobs are fetched from `<server_prefix><digest>`.
    pub server_prefix: String,
    pub cache_root: PathBuf,
    pub output_root: PathBuf,
    pub concurrency: usize,
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), RunError> {
        check_concurrency(self.concurrency)?;
        let url = url::Url::parse(&self.server_prefix).map_err(|e| {
            RunError::InvalidOptions(format!("server prefix {:?}: {}", self.server_prefix, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RunError::InvalidOptions(format!(
                "server prefix {:?}: only http and https are supported",
                self.server_prefix
            )));
        }
        Ok(())
    }
}

/// Fetch, verify, cache and link everything in `opts.manifest` using curl.
pub fn run_workload(opts: &RunOptions) -> Result<RunSummary, RunError> {
    run_workload_with(opts, CurlFetcher::default(), &Progress::none())
}

/// Like [`run_workload`] with a caller-supplied fetcher and progress sink.
///
/// The whole manifest is parsed before anything is dispatched, so a bad line
/// anywhere fails the run with nothing downloaded or linked.
pub fn run_workload_with<F: Fetch>(
    opts: &RunOptions,
    fetcher: F,
    progress: &Progress,
) -> Result<RunSummary, RunError> {
    opts.validate()?;
    let entries = Manifest::open(&opts.manifest)?.collect::<Result<Vec<_>, _>>()?;
    let store = CacheStore::open(&opts.cache_root)?;
    tracing::info!(
        entries = entries.len(),
        cache = %opts.cache_root.display(),
        output = %opts.output_root.display(),
        server = %opts.server_prefix,
        concurrency = opts.concurrency,
        "starting run"
    );
    let dispatcher = Dispatcher::new(
        store,
        fetcher,
        opts.server_prefix.clone(),
        opts.output_root.clone(),
        opts.concurrency,
    );
    let summary = dispatcher.run(entries, progress)?;
    tracing::info!("run complete: {}", summary);
    Ok(summary)
}

pub struct Dispatcher<F> {
    store: CacheStore,
    fetcher: F,
    server_prefix: String,
    output_root: PathBuf,
    concurrency: usize,
}

/// Aggregated worker outcomes; keeps the first failure.
#[derive(Default)]
struct RunState {
    summary: RunSummary,
    first_error: Option<RunError>,
    extra_failures: usize,
    skipped: usize,
}

impl RunState {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Done(done) => {
                self.summary.downloads += 1;
                self.summary.bytes_downloaded += done.bytes;
                self.summary.record_link(done.link);
            }
            TaskOutcome::Failed(e) => self.fail(e),
            TaskOutcome::Skipped(digest) => {
                tracing::debug!(%digest, "skipped after abort");
                self.skipped += 1;
            }
        }
    }

    fn fail(&mut self, e: RunError) {
        tracing::warn!("task failed: {}", e);
        if self.first_error.is_none() {
            self.first_error = Some(e);
        } else {
            self.extra_failures += 1;
        }
    }

    fn failed(&self) -> bool {
        self.first_error.is_some()
    }
}

impl<F: Fetch> Dispatcher<F> {
    pub fn new(
        store: CacheStore,
        fetcher: F,
        server_prefix: impl Into<String>,
        output_root: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            server_prefix: server_prefix.into(),
            output_root: output_root.into(),
            concurrency,
        }
    }

    /// Dispatch `entries` in order and wait for every worker to finish.
    ///
    /// Each distinct missing digest is downloaded at most once per run; later
    /// entries for a digest already queued are linked after the pool drains.
    pub fn run<I>(&self, entries: I, progress: &Progress) -> Result<RunSummary, RunError>
    where
        I: IntoIterator<Item = WorkloadEntry>,
    {
        check_concurrency(self.concurrency)?;

        let (task_tx, task_rx) = mpsc::sync_channel::<FetchTask>(self.concurrency);
        let queue = Mutex::new(task_rx);
        let (outcome_tx, outcome_rx) = mpsc::channel::<TaskOutcome>();
        let abort = AtomicBool::new(false);
        let mut state = RunState::default();
        let mut queued: HashSet<Digest> = HashSet::new();
        let mut deferred: Vec<(Digest, PathBuf)> = Vec::new();

        thread::scope(|s| {
            for id in 0..self.concurrency {
                let w = Worker {
                    id,
                    store: &self.store,
                    fetcher: &self.fetcher,
                    queue: &queue,
                    outcomes: outcome_tx.clone(),
                    abort: &abort,
                    progress: progress.clone(),
                };
                s.spawn(move || w.run());
            }
            drop(outcome_tx);

            for entry in entries {
                while let Ok(outcome) = outcome_rx.try_recv() {
                    state.record(outcome);
                }
                if state.failed() || abort.load(Ordering::SeqCst) {
                    break;
                }
                state.summary.entries += 1;
                let output = self.output_root.join(&entry.output);

                if queued.contains(&entry.digest) {
                    deferred.push((entry.digest, output));
                    continue;
                }

                let hit = match self.store.has(&entry.digest) {
                    Ok(hit) => hit,
                    Err(e) => {
                        abort.store(true, Ordering::SeqCst);
                        state.fail(e.into());
                        break;
                    }
                };
                if hit {
                    let cache_file = self.store.path_for(&entry.digest);
                    tracing::debug!(digest = %entry.digest, output = %output.display(), "cache hit");
                    state.summary.hits += 1;
                    progress.emit(ProgressEvent::Hit {
                        digest: entry.digest.clone(),
                        output: output.clone(),
                    });
                    match materialize::link(&cache_file, &output) {
                        Ok(outcome) => state.summary.record_link(outcome),
                        Err(source) => {
                            abort.store(true, Ordering::SeqCst);
                            state.fail(RunError::Link {
                                digest: entry.digest,
                                source,
                            });
                            break;
                        }
                    }
                    continue;
                }

                let task = FetchTask::new(
                    entry.digest.clone(),
                    self.store.path_for(&entry.digest),
                    output,
                    fetcher::blob_url(&self.server_prefix, &entry.digest),
                );
                queued.insert(entry.digest);
                // Blocks while the queue is full.
                if task_tx.send(task).is_err() {
                    break;
                }
            }

            // Close the queue; workers exit once it is drained.
            drop(task_tx);
            for outcome in outcome_rx {
                state.record(outcome);
            }
        });

        if let Some(e) = state.first_error {
            if state.extra_failures > 0 || state.skipped > 0 {
                tracing::warn!(
                    further_failures = state.extra_failures,
                    skipped = state.skipped,
                    "run aborted"
                );
            }
            return Err(e);
        }

        let mut summary = state.summary;
        for (digest, output) in deferred {
            let cache_file = self.store.path_for(&digest);
            let outcome = materialize::link(&cache_file, &output)
                .map_err(|source| RunError::Link {
                    digest: digest.clone(),
                    source,
                })?;
            summary.record_link(outcome);
            progress.emit(ProgressEvent::Linked {
                digest,
                output,
                outcome,
            });
        }
        Ok(summary)
    }
}
