//! Optional retry of transient fetch failures.
//!
//! Off unless the config has a `[retry]` section. Every attempt rewrites the
//! temp file from scratch; the caller verifies only the final attempt's bytes.

mod classify;
mod policy;
mod run;

pub use classify::is_transient;
pub use policy::RetryPolicy;
pub use run::run_with_retry;
