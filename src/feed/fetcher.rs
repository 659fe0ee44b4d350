use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, FeedEntry};

const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving and parsing a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed body could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Per-request knobs for [`fetch_feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Total request timeout. `None` leaves the HTTP client's default in place.
    pub timeout: Option<Duration>,
    /// Upper bound on the response body size in bytes.
    pub max_feed_bytes: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            max_feed_bytes: DEFAULT_MAX_FEED_SIZE,
        }
    }
}

/// Fetches `url` with a single GET and parses the body into entries.
///
/// A fresh client is built for every call; no connection is reused across
/// requests and nothing is retried.
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Request exceeded the configured timeout
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Body exceeded `max_feed_bytes`
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
/// - [`FetchError::Parse`] - Body is not RSS/Atom
pub async fn fetch_feed(
    url: &str,
    settings: &FetchSettings,
) -> Result<Vec<FeedEntry>, FetchError> {
    let client = reqwest::Client::new();

    let response = match settings.timeout {
        Some(limit) => tokio::time::timeout(limit, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)??,
        None => client.get(url).send().await?,
    };

    if !response.status().is_success() {
        tracing::debug!(url = %url, status = %response.status(), "Feed request rejected");
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, settings.max_feed_bytes).await?;
    tracing::debug!(url = %url, bytes = bytes.len(), "Feed body received");

    parse_feed(&bytes)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
