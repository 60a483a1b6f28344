//! Progress events for the CLI and the end-of-run summary.

use crate::checksum::Digest;
use crate::materialize::LinkOutcome;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Digest was already cached; linked on the dispatch thread.
    Hit { digest: Digest, output: PathBuf },
    Downloading { url: String, cache_file: PathBuf },
    Downloaded { digest: Digest, bytes: u64 },
    Linked {
        digest: Digest,
        output: PathBuf,
        outcome: LinkOutcome,
    },
}

/// Optional sink for progress events. Send failures (receiver gone) are ignored.
#[derive(Debug, Clone, Default)]
pub struct Progress(Option<Sender<ProgressEvent>>);

impl Progress {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self(Some(tx))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Counters for one successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Manifest entries dispatched.
    pub entries: usize,
    /// Entries whose digest was already cached when dispatched.
    pub hits: usize,
    /// Blobs downloaded, verified and committed.
    pub downloads: usize,
    pub bytes_downloaded: u64,
    pub links_created: usize,
    /// Output paths that already existed and were left alone.
    pub links_existing: usize,
}

impl RunSummary {
    pub(crate) fn record_link(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Created => self.links_created += 1,
            LinkOutcome::AlreadyExists => self.links_existing += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries: {} cached, {} downloaded ({:.1} MiB), {} linked, {} already present",
            self.entries,
            self.hits,
            self.downloads,
            self.bytes_downloaded as f64 / 1_048_576.0,
            self.links_created,
            self.links_existing
        )
    }
}
