//! CLI command handlers.

mod fetch;
mod verify;

pub use fetch::{run_fetch, FetchArgs};
pub use verify::run_verify;
