use super::policy::RetryPolicy;
use crate::fetcher::FetchError;

/// Call `f` until it succeeds or `policy` gives up, sleeping between attempts.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut f: F) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let mut attempt = 1u32;
    loop {
        let err = match f() {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let Some(delay) = policy.next_delay(attempt, &err) else {
            return Err(err);
        };
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "fetch failed, retrying: {}",
            err
        );
        std::thread::sleep(delay);
        attempt += 1;
    }
}
