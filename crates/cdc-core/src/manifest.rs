//! Workload manifest: one `<sha256> <relative output path>` pair per line.

use crate::checksum::{Digest, InvalidDigest};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

/// One requested materialization: content `digest` at `output` (relative to the output root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadEntry {
    pub digest: Digest,
    pub output: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to open manifest {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("manifest line {line}: read failed: {source}")]
    Read { line: usize, source: io::Error },
    #[error("manifest line {line}: expected `<digest> <path>`, found {tokens} token(s): {text:?}")]
    TokenCount {
        line: usize,
        tokens: usize,
        text: String,
    },
    #[error("manifest line {line}: {source}")]
    Digest { line: usize, source: InvalidDigest },
    #[error("manifest line {line}: output path {path:?} must be relative and stay inside the output directory")]
    UnsafePath { line: usize, path: String },
}

pub struct Manifest;

impl Manifest {
    /// Open a manifest file for lazy, in-order parsing.
    pub fn open(path: &Path) -> Result<Entries<BufReader<File>>, ManifestError> {
        let file = File::open(path).map_err(|source| ManifestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Entries::new(BufReader::new(file)))
    }
}

/// Iterator over manifest entries. Yields an error for the first bad line;
/// callers are expected to stop there (the run is aborted, nothing is skipped).
pub struct Entries<R> {
    lines: io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> Entries<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for Entries<R> {
    type Item = Result<WorkloadEntry, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.lines.next()?;
        self.line_no += 1;
        let line = self.line_no;
        Some(match text {
            Ok(t) => parse_line(line, &t),
            Err(source) => Err(ManifestError::Read { line, source }),
        })
    }
}

/// Parse one manifest line. A blank line has zero tokens and is rejected.
pub fn parse_line(line: usize, text: &str) -> Result<WorkloadEntry, ManifestError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [digest, output] = tokens[..] else {
        return Err(ManifestError::TokenCount {
            line,
            tokens: tokens.len(),
            text: text.to_string(),
        });
    };
    let digest = Digest::parse(digest).map_err(|source| ManifestError::Digest { line, source })?;
    let output = PathBuf::from(output);
    if !is_contained(&output) {
        return Err(ManifestError::UnsafePath {
            line,
            path: output.to_string_lossy().into_owned(),
        });
    }
    Ok(WorkloadEntry { digest, output })
}

/// True if `p` is relative and has no `..`, root or prefix components.
fn is_contained(p: &Path) -> bool {
    let mut normal = 0usize;
    for c in p.components() {
        match c {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    normal > 0
}
