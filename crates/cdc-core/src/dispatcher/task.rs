//! A queued download and its lifecycle.

use crate::checksum::Digest;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Downloading,
    Verified,
    Committed,
    Linked,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Downloading => "downloading",
            TaskState::Verified => "verified",
            TaskState::Committed => "committed",
            TaskState::Linked => "linked",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Created by the dispatcher for a cache miss; owned by the worker that dequeues it.
#[derive(Debug)]
pub struct FetchTask {
    pub digest: Digest,
    pub cache_file: PathBuf,
    pub output: PathBuf,
    pub url: String,
    state: TaskState,
}

impl FetchTask {
    pub fn new(digest: Digest, cache_file: PathBuf, output: PathBuf, url: String) -> Self {
        Self {
            digest,
            cache_file,
            output,
            url,
            state: TaskState::Pending,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub(super) fn advance(&mut self, next: TaskState) {
        debug_assert!(
            !matches!(self.state, TaskState::Linked | TaskState::Failed),
            "task {} already terminal",
            self.digest
        );
        tracing::debug!(digest = %self.digest, from = %self.state, to = %next, "task state");
        self.state = next;
    }
}
