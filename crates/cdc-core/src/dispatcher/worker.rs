//! Worker loop: dequeue, fetch, verify, commit, link.

use super::task::{FetchTask, TaskState};
use crate::checksum::Digest;
use crate::error::RunError;
use crate::fetcher::Fetch;
use crate::materialize::{self, LinkOutcome};
use crate::progress::{Progress, ProgressEvent};
use crate::store::CacheStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug)]
pub(super) struct TaskSuccess {
    pub bytes: u64,
    pub link: LinkOutcome,
}

#[derive(Debug)]
pub(super) enum TaskOutcome {
    Done(TaskSuccess),
    Failed(RunError),
    /// Dequeued after the run was aborted; never started.
    Skipped(Digest),
}

pub(super) struct Worker<'a, F> {
    pub id: usize,
    pub store: &'a CacheStore,
    pub fetcher: &'a F,
    pub queue: &'a Mutex<Receiver<FetchTask>>,
    pub outcomes: Sender<TaskOutcome>,
    pub abort: &'a AtomicBool,
    pub progress: Progress,
}

impl<F: Fetch> Worker<'_, F> {
    /// Drain the queue until the dispatcher closes it. Keeps draining after an
    /// abort (skipping tasks) so the dispatcher never blocks on a full queue.
    pub fn run(self) {
        loop {
            let next = match self.queue.lock() {
                Ok(rx) => rx.recv(),
                Err(_) => break,
            };
            let Ok(mut task) = next else {
                break;
            };
            let outcome = if self.abort.load(Ordering::SeqCst) {
                TaskOutcome::Skipped(task.digest.clone())
            } else {
                match self.process(&mut task) {
                    Ok(done) => TaskOutcome::Done(done),
                    Err(e) => {
                        tracing::debug!(worker = self.id, digest = %task.digest, stage = %task.state(), "task failed");
                        task.advance(TaskState::Failed);
                        self.abort.store(true, Ordering::SeqCst);
                        TaskOutcome::Failed(e)
                    }
                }
            };
            if self.outcomes.send(outcome).is_err() {
                break;
            }
        }
        tracing::debug!(worker = self.id, "worker exiting");
    }

    fn process(&self, task: &mut FetchTask) -> Result<TaskSuccess, RunError> {
        task.advance(TaskState::Downloading);
        tracing::info!(worker = self.id, "Downloading {} to {}", task.url, task.cache_file.display());
        self.progress.emit(ProgressEvent::Downloading {
            url: task.url.clone(),
            cache_file: task.cache_file.clone(),
        });

        let temp = self.store.temp_file(&task.digest)?;
        let fetched = self
            .fetcher
            .fetch(&task.url, &temp)
            .map_err(|source| RunError::Fetch {
                digest: task.digest.clone(),
                source,
            })?;
        if fetched.digest != task.digest.as_str() {
            // `temp` is dropped here, removing the mismatched bytes.
            tracing::warn!(digest = %task.digest, actual = %fetched.digest, url = %task.url, "digest mismatch");
            return Err(RunError::Integrity {
                digest: task.digest.clone(),
                url: task.url.clone(),
                actual: fetched.digest,
            });
        }
        task.advance(TaskState::Verified);

        self.store.commit_verified(temp, &task.digest)?;
        task.advance(TaskState::Committed);
        self.progress.emit(ProgressEvent::Downloaded {
            digest: task.digest.clone(),
            bytes: fetched.bytes,
        });

        let link = materialize::link(&task.cache_file, &task.output).map_err(|source| {
            RunError::Link {
                digest: task.digest.clone(),
                source,
            }
        })?;
        task.advance(TaskState::Linked);
        self.progress.emit(ProgressEvent::Linked {
            digest: task.digest.clone(),
            output: task.output.clone(),
            outcome: link,
        });
        Ok(TaskSuccess {
            bytes: fetched.bytes,
            link,
        })
    }
}
