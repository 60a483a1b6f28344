//! Run-level error: one variant per failure class, each naming the blob involved.

use crate::checksum::Digest;
use crate::fetcher::FetchError;
use crate::manifest::ManifestError;
use crate::materialize::LinkError;
use crate::store::StoreError;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("fetching {digest} failed: {source}")]
    Fetch { digest: Digest, source: FetchError },
    /// The server returned bytes whose digest differs from the one requested.
    #[error("integrity check failed for {digest}: {url} served content with sha256 {actual}")]
    Integrity {
        digest: Digest,
        url: String,
        actual: String,
    },
    #[error("materializing {digest} failed: {source}")]
    Link { digest: Digest, source: LinkError },
}

/// Coarse cause of a failed run, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Usage,
    Parse,
    Transport,
    Integrity,
    Filesystem,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Usage => "usage",
            ErrorClass::Parse => "parse",
            ErrorClass::Transport => "transport",
            ErrorClass::Integrity => "integrity",
            ErrorClass::Filesystem => "filesystem",
        };
        f.write_str(s)
    }
}

impl RunError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RunError::InvalidOptions(_) => ErrorClass::Usage,
            RunError::Manifest(ManifestError::Open { .. } | ManifestError::Read { .. }) => {
                ErrorClass::Filesystem
            }
            RunError::Manifest(_) => ErrorClass::Parse,
            RunError::Fetch { source, .. } if source.is_local() => ErrorClass::Filesystem,
            RunError::Fetch { .. } => ErrorClass::Transport,
            RunError::Integrity { .. } => ErrorClass::Integrity,
            RunError::Store(_) | RunError::Link { .. } => ErrorClass::Filesystem,
        }
    }
}
