//! Byte fetcher abstraction for testability.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;

use crate::error::FetchError;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Loads the bytes behind one URL.
///
/// This abstraction allows the scheduler to run against mock fetchers in
/// tests. Implementations do not retry.
pub trait ByteFetcher: Send + Sync + 'static {
    /// Fetches `url`.
    ///
    /// # Returns
    ///
    /// The response body or an error describing why nothing usable arrived.
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// HTTP fetcher backed by reqwest.
///
/// Non-2xx responses are failures, and bodies that are not a recognizable
/// image format are rejected as decoding failures.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a fetcher with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl ByteFetcher for ReqwestFetcher {
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Body(e.to_string()))?;

            ensure_image(&body)?;
            Ok(body)
        })
    }
}

/// Rejects bodies that do not start with a known image signature.
pub(crate) fn ensure_image(body: &[u8]) -> Result<(), FetchError> {
    image::guess_format(body)
        .map(|_| ())
        .map_err(|e| FetchError::Decode(e.to_string()))
}
