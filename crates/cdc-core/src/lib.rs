pub mod config;
pub mod logging;

pub mod checksum;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod manifest;
pub mod materialize;
pub mod progress;
pub mod retry;
pub mod store;
pub mod verify;

pub use dispatcher::{run_workload, run_workload_with, Dispatcher, RunOptions};
pub use error::{ErrorClass, RunError};
pub use progress::{Progress, ProgressEvent, RunSummary};
