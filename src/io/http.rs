use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::ReadAt;
use crate::error::ArchiveError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 10;
const BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Reads a remote report archive through HTTP Range requests.
///
/// Only the tail of the archive and the entries themselves are fetched, so a
/// report can be ingested straight from an artifact server.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
}

impl HttpRangeReader {
    /// Probe `url` with a HEAD request.
    ///
    /// The server must advertise byte ranges and a content length.
    pub async fn new(url: String) -> Result<Self, ArchiveError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let resp = client.head(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ArchiveError::Remote(format!("HEAD {url} answered {status}")));
        }

        let headers = resp.headers();
        if !header_str(headers, ACCEPT_RANGES).is_some_and(|v| v.contains("bytes")) {
            return Err(ArchiveError::Remote(format!("{url} does not serve byte ranges")));
        }
        let size = header_str(headers, CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| ArchiveError::Remote(format!("{url} sent no content length")))?;

        debug!("remote archive {} is {} bytes", url, size);
        Ok(Self { client, url, size })
    }

    /// One ranged GET. Connection failures and timeouts come back as `Ok(None)`
    /// so the caller can retry.
    async fn fetch(&self, first: u64, last: u64) -> Result<Option<Vec<u8>>, ArchiveError> {
        let range = format!("bytes={first}-{last}");
        let resp = match self.client.get(&self.url).header(RANGE, &range).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!("range {} of {} failed: {}", range, self.url, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(ArchiveError::Remote(format!(
                "range {} of {} answered {}",
                range,
                self.url,
                resp.status()
            )));
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, ArchiveError> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let last = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let wanted = (last - offset + 1) as usize;
        let mut filled = 0;
        let mut failures = 0;

        while filled < wanted {
            let Some(bytes) = self.fetch(offset + filled as u64, last).await? else {
                failures += 1;
                if failures >= MAX_ATTEMPTS {
                    return Err(ArchiveError::Remote(format!(
                        "giving up on {} after {} attempts",
                        self.url, failures
                    )));
                }
                tokio::time::sleep(BACKOFF_STEP * failures).await;
                continue;
            };
            if bytes.is_empty() {
                break;
            }
            let n = bytes.len().min(wanted - filled);
            buf[filled..filled + n].copy_from_slice(&bytes[..n]);
            filled += n;
        }

        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
