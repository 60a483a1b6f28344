//! `cas-disk-cache fetch` – run a workload file.

use anyhow::Result;
use cdc_core::config::CdcConfig;
use cdc_core::fetcher::{CurlFetcher, Fetch, Retrying};
use cdc_core::retry::RetryPolicy;
use cdc_core::{run_workload_with, Progress, ProgressEvent, RunError, RunOptions};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

#[derive(Debug)]
pub struct FetchArgs {
    pub manifest: PathBuf,
    pub server_prefix: String,
    pub cache_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub concurrency: Option<usize>,
}

pub fn run_fetch(cfg: &CdcConfig, args: FetchArgs) -> Result<()> {
    let cache_root = match args.cache_dir {
        Some(dir) => dir,
        None => cfg.resolve_cache_dir()?,
    };
    let opts = RunOptions {
        manifest: args.manifest,
        server_prefix: args.server_prefix,
        cache_root,
        output_root: args.output_dir,
        concurrency: args.concurrency.unwrap_or(cfg.concurrency),
    };

    let policy = RetryPolicy::from_config(cfg.retry.as_ref());
    let fetcher = Retrying::new(CurlFetcher::new(cfg.fetch_options()), policy);
    run_with_printer(&opts, fetcher)
}

fn run_with_printer<F: Fetch>(opts: &RunOptions, fetcher: F) -> Result<()> {
    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let printer = thread::spawn(move || {
        for event in rx {
            if let ProgressEvent::Downloading { url, cache_file } = event {
                println!("Downloading {} to {}", url, cache_file.display());
            }
        }
    });

    let progress = Progress::new(tx);
    let result = run_workload_with(opts, fetcher, &progress);
    // Dropping the last sender ends the printer loop.
    drop(progress);
    let _ = printer.join();

    let summary = result.map_err(with_class)?;
    println!("{}", summary);
    Ok(())
}

/// Prefix a run failure with its cause class, e.g. `integrity error: ...`.
fn with_class(err: RunError) -> anyhow::Error {
    let class = err.class();
    anyhow::Error::new(err).context(format!("{} error", class))
}
