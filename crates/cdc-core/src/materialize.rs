//! Hardlink cached blobs into the output tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// Something already exists at the output path; left untouched.
    AlreadyExists,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to link {} -> {}: {source}", cache_file.display(), output.display())]
    Link {
        cache_file: PathBuf,
        output: PathBuf,
        source: io::Error,
    },
}

/// Hardlink `cache_file` at `output`, creating parent directories as needed.
/// An existing `output` counts as success, so re-running a workload is a no-op.
pub fn link(cache_file: &Path, output: &Path) -> Result<LinkOutcome, LinkError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LinkError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    match fs::hard_link(cache_file, output) {
        Ok(()) => Ok(LinkOutcome::Created),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(LinkOutcome::AlreadyExists),
        Err(source) => Err(LinkError::Link {
            cache_file: cache_file.to_path_buf(),
            output: output.to_path_buf(),
            source,
        }),
    }
}
