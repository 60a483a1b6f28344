//! Stream a remote blob to a local file while hashing it.
//!
//! The fetcher never compares against an expected digest; it only reports
//! what it received. Verification is the caller's job (see `dispatcher`).

mod curl_fetcher;
mod retrying;

pub use curl_fetcher::{CurlFetcher, FetchOptions};
pub use retrying::Retrying;

use std::io;
use std::path::{Path, PathBuf};

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Lowercase hex SHA-256 of the bytes written to the temp file.
    pub digest: String,
    pub bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, TLS, ...).
    #[error("GET {url} failed: {source}")]
    Transport { url: String, source: curl::Error },
    /// Response had a non-2xx status.
    #[error("GET {url} returned HTTP {code}")]
    Http { url: String, code: u32 },
    /// Writing the temp file failed (disk full, permissions, ...). Never retried.
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl FetchError {
    /// True when the failure is on our side of the wire.
    pub fn is_local(&self) -> bool {
        matches!(self, FetchError::Write { .. })
    }
}

/// Fetch `url` into `dest`, truncating whatever `dest` held before.
///
/// On return `dest` holds exactly the bytes received, on success and on
/// failure alike; the caller decides what to do with them.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError> {
        (**self).fetch(url, dest)
    }
}

impl<F: Fetch + ?Sized> Fetch for Box<F> {
    fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError> {
        (**self).fetch(url, dest)
    }
}

/// Remote location of `digest`: plain concatenation, the server exposes blobs at `<prefix><digest>`.
pub fn blob_url(server_prefix: &str, digest: &crate::checksum::Digest) -> String {
    format!("{}{}", server_prefix, digest)
}
