//! Wrap any fetcher with the transient-error retry policy.

use super::{Fetch, FetchError, Fetched};
use crate::retry::{run_with_retry, RetryPolicy};
use std::path::Path;

/// Retries transient failures of the inner fetcher. Every attempt rewrites
/// `dest` from scratch, so the digest the caller verifies is always that of
/// one complete response.
pub struct Retrying<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: Fetch> Retrying<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<F: Fetch> Fetch for Retrying<F> {
    fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError> {
        run_with_retry(&self.policy, || self.inner.fetch(url, dest))
    }
}
