//! Conditional archive fetch
//!
//! Header construction and status classification are plain functions
//! ([`conditional_headers`], [`classify_status`]); [`Fetcher`] only adds the
//! streaming I/O around them.

use crate::config::ImporterConfig;
use crate::error::{Error, Result};
use crate::types::{FetchDecision, FetchOutcome, ImportRequest};
use chrono::{DateTime, Utc};
use reqwest::header::{ETAG, HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;


/// Format a timestamp as an HTTP-date (IMF-fixdate)
pub fn format_http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the cache-validation request headers
///
/// `If-Modified-Since` is only present when a previous Last-Modified is known,
/// `If-None-Match` only when a previous non-empty ETag is known.
pub fn conditional_headers(
    last_modified: Option<&DateTime<Utc>>,
    etag: Option<&str>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(ts) = last_modified {
        let value = HeaderValue::from_str(&format_http_date(ts))
            .map_err(|e| Error::config(format!("invalid last_modified: {e}"), "last_modified"))?;
        headers.insert(IF_MODIFIED_SINCE, value);
    }

    if let Some(etag) = etag.filter(|e| !e.is_empty()) {
        let value = HeaderValue::from_str(etag)
            .map_err(|e| Error::config(format!("invalid etag {etag:?}: {e}"), "etag"))?;
        headers.insert(IF_NONE_MATCH, value);
    }

    Ok(headers)
}

/// Decide what a response status means for the run
pub fn classify_status(status: u16) -> FetchDecision {
    match status {
        200 => FetchDecision::NewData,
        304 => FetchDecision::NotModified,
        404 => FetchDecision::NotFound,
        other => FetchDecision::Unexpected(other),
    }
}

/// HTTP client performing the conditional GET
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build the HTTP client from the importer configuration
    pub fn new(config: &ImporterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: None,
            })?;
        Ok(Self { client })
    }

    /// Fetch the archive to `destination` unless the server reports it unchanged
    ///
    /// The body is written chunk by chunk. The returned outcome is only
    /// produced after the file has been flushed; on any failure while the body
    /// is written the partial file is removed.
    pub async fn fetch(
        &self,
        url: &Url,
        request: &ImportRequest,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let headers = conditional_headers(request.last_modified.as_ref(), request.etag.as_deref())?;

        debug!(
            %url,
            if_modified_since = headers.contains_key(IF_MODIFIED_SINCE),
            if_none_match = headers.contains_key(IF_NONE_MATCH),
            "sending conditional request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(url.clone()).headers(headers).send() => response?,
        };

        let status = response.status();
        // reqwest exposes no reason phrase, only the status code
        let status_message = status.canonical_reason().unwrap_or_default().to_string();

        let modified = match classify_status(status.as_u16()) {
            FetchDecision::NewData => true,
            FetchDecision::NotModified => false,
            FetchDecision::NotFound => {
                warn!(%url, "source archive not found");
                return Err(Error::NotFound {
                    url: url.to_string(),
                });
            }
            FetchDecision::Unexpected(code) => {
                warn!(%url, status = code, "unexpected response status");
                return Err(Error::UnknownFetch {
                    status: code,
                    message: status_message,
                });
            }
        };

        let (last_modified, etag) = if modified {
            (
                header_string(response.headers(), &LAST_MODIFIED),
                header_string(response.headers(), &ETAG),
            )
        } else {
            (None, None)
        };

        let (bytes_written, digest) =
            match write_body(response, destination, cancel, modified).await {
                Ok(written) => written,
                Err(e) => {
                    discard_partial(destination).await;
                    return Err(e);
                }
            };

        info!(
            %url,
            status = status.as_u16(),
            modified,
            bytes_written,
            "fetch finished"
        );

        Ok(FetchOutcome {
            status_code: status.as_u16(),
            status_message,
            modified,
            last_modified,
            etag,
            bytes_written,
            sha256: digest,
        })
    }
}

/// Stream the response body into `destination`, optionally hashing it
async fn write_body(
    mut response: reqwest::Response,
    destination: &Path,
    cancel: &CancellationToken,
    hash: bool,
) -> Result<(u64, Option<String>)> {
    let mut file = tokio::fs::File::create(destination).await?;
    let mut hasher = hash.then(Sha256::new);
    let mut written = 0u64;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            chunk = response.chunk() => chunk?,
        };
        let Some(chunk) = chunk else { break };

        file.write_all(&chunk).await?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        written += chunk.len() as u64;
    }

    file.flush().await?;
    drop(file);

    debug!(?destination, written, "response body written");
    Ok((written, hasher.map(|h| format!("{:x}", h.finalize()))))
}

async fn discard_partial(destination: &Path) {
    if let Err(e) = tokio::fs::remove_file(destination).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(?destination, error = %e, "failed to remove partial download");
    }
}

fn header_string(headers: &HeaderMap, name: &reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
