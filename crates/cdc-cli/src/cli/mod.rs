//! CLI for the cas-disk-cache blob fetcher.

mod commands;

use anyhow::Result;
use cdc_core::config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_fetch, run_verify, FetchArgs};

/// Fetch content-addressed blobs into a shared disk cache and hardlink them into place.
#[derive(Debug, Parser)]
#[command(name = "cas-disk-cache")]
#[command(about = "Content-addressed blob fetcher with a shared on-disk cache", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every blob named in a workload file and link it to its output path.
    Fetch {
        /// Workload file: one `<sha256> <relative output path>` per line.
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: PathBuf,

        /// URL prefix; each blob is fetched from `<PREFIX><sha256>`.
        #[arg(short = 's', long = "server", value_name = "PREFIX")]
        server: String,

        /// Cache directory (default: config `cache_dir`, else the XDG cache dir).
        #[arg(short = 'c', long = "cache-dir", value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// Directory output paths are relative to.
        #[arg(short = 'o', long = "output-dir", value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Concurrent downloads (default: config `concurrency`).
        #[arg(short = 'j', long = "concurrency", visible_alias = "jobs", value_name = "N")]
        concurrency: Option<usize>,
    },

    /// Re-hash every cache entry and report those that do not match their name.
    Verify {
        /// Cache directory (default: config `cache_dir`, else the XDG cache dir).
        #[arg(short = 'c', long = "cache-dir", value_name = "DIR")]
        cache_dir: Option<PathBuf>,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                file,
                server,
                cache_dir,
                output_dir,
                concurrency,
            } => {
                let args = FetchArgs {
                    manifest: file,
                    server_prefix: server,
                    cache_dir,
                    output_dir,
                    concurrency,
                };
                run_fetch(&cfg, args)?;
            }
            CliCommand::Verify { cache_dir } => run_verify(&cfg, cache_dir)?,
        }

        Ok(())
    }
}
