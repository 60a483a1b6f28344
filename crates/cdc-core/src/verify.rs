//! Re-hash committed cache entries and report any whose bytes no longer
//! match their name. Read-only: nothing is deleted or repaired.

use crate::checksum::{sha256_path, Digest};
use crate::store::CacheStore;
use anyhow::Result;

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub checked: usize,
    /// Entries whose content digest differs from their file name.
    pub corrupt: Vec<(Digest, String)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
    }
}

pub fn verify_cache(store: &CacheStore) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();
    for digest in store.entries()? {
        let actual = sha256_path(&store.path_for(&digest))?;
        report.checked += 1;
        if actual != digest.as_str() {
            tracing::warn!(%digest, %actual, "cache entry does not match its digest");
            report.corrupt.push((digest, actual));
        }
    }
    Ok(report)
}
