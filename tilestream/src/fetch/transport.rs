//! HTTP transport abstraction for testability

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

/// Errors from a tile transfer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read.
    #[error("failed to read response: {0}")]
    Body(String),

    /// The transfer was aborted by a cancel broadcast.
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns true if the transfer was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

/// Trait for fetching tile payloads.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock transports in tests. Returned futures must not borrow
/// from the transport, since they are spawned onto the fetch worker's runtime.
pub trait TileTransport: Send + Sync + 'static {
    /// Performs an HTTP GET request.
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, TransportError>>;
}

/// Real HTTP transport using reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport that identifies itself as `user_agent`.
    ///
    /// Many tile servers reject requests without a meaningful User-Agent.
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl TileTransport for ReqwestTransport {
    fn get(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, TransportError>> {
        let client = self.client.clone();
        let url = url.to_string();
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| TransportError::Http(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TransportError::Status {
                    status: response.status().as_u16(),
                    url,
                });
            }

            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| TransportError::Body(e.to_string()))
        })
    }
}
