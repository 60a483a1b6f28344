//! Single-stream HTTP GET with curl, hashed on the way to disk.

use super::{Fetch, FetchError, Fetched};
use crate::checksum::HashingWriter;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Transfer knobs for the curl easy handle.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    /// Abort if throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard cap so a completely stuck transfer eventually fails.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    opts: FetchOptions,
}

impl CurlFetcher {
    pub fn new(opts: FetchOptions) -> Self {
        Self { opts }
    }
}

impl Fetch for CurlFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError> {
        let write_err = |source| FetchError::Write {
            path: dest.to_path_buf(),
            source,
        };
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let file = File::create(dest).map_err(write_err)?;
        let mut out = HashingWriter::new(BufWriter::new(file));
        let mut storage_error: Option<io::Error> = None;

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(transport)?;
        easy.follow_location(true).map_err(transport)?;
        easy.max_redirections(10).map_err(transport)?;
        easy.connect_timeout(self.opts.connect_timeout).map_err(transport)?;
        easy.low_speed_limit(self.opts.low_speed_limit).map_err(transport)?;
        easy.low_speed_time(self.opts.low_speed_time).map_err(transport)?;
        easy.timeout(self.opts.timeout).map_err(transport)?;

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| match out.write_all(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        storage_error = Some(e);
                        Ok(0) // abort transfer
                    }
                })
                .map_err(transport)?;
            transfer.perform()
        };
        if let Err(e) = performed {
            if e.is_write_error() {
                if let Some(io_err) = storage_error {
                    return Err(write_err(io_err));
                }
            }
            return Err(transport(e));
        }

        let code = easy.response_code().map_err(transport)?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http {
                url: url.to_string(),
                code,
            });
        }

        let bytes = out.bytes_written();
        let (buf, digest) = out.finish();
        let file = buf.into_inner().map_err(|e| write_err(e.into_error()))?;
        file.sync_all().map_err(write_err)?;
        Ok(Fetched { digest, bytes })
    }
}
