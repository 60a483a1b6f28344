//! `cas-disk-cache verify` – re-hash the cache.

use anyhow::{bail, Result};
use cdc_core::config::CdcConfig;
use cdc_core::store::CacheStore;
use cdc_core::verify::verify_cache;
use std::path::PathBuf;

pub fn run_verify(cfg: &CdcConfig, cache_dir: Option<PathBuf>) -> Result<()> {
    let root = match cache_dir {
        Some(dir) => dir,
        None => cfg.resolve_cache_dir()?,
    };
    let store = CacheStore::open(&root)?;
    let report = verify_cache(&store)?;
    for (digest, actual) in &report.corrupt {
        println!(
            "CORRUPT {} (content hashes to {})",
            store.path_for(digest).display(),
            actual
        );
    }
    println!("{} entries checked, {} corrupt", report.checked, report.corrupt.len());
    if !report.is_clean() {
        bail!(
            "{} corrupt cache entries in {}",
            report.corrupt.len(),
            root.display()
        );
    }
    Ok(())
}
