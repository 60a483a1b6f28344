use cdc_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Log to the state file; fall back to stderr if it cannot be opened.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("cas-disk-cache error: {:#}", err);
        std::process::exit(1);
    }
}
