//! Which fetch failures are worth another attempt.

use crate::fetcher::FetchError;

/// Timeouts, dropped connections, 408/429 and 5xx are transient. Other 4xx
/// statuses and local write failures are not: retrying cannot fix them.
pub fn is_transient(e: &FetchError) -> bool {
    match e {
        FetchError::Transport { source, .. } => {
            source.is_operation_timedout()
                || source.is_couldnt_connect()
                || source.is_couldnt_resolve_host()
                || source.is_recv_error()
                || source.is_send_error()
                || source.is_got_nothing()
                || source.is_partial_file()
        }
        FetchError::Http { code, .. } => matches!(code, 408 | 429 | 500..=599),
        FetchError::Write { .. } => false,
    }
}
