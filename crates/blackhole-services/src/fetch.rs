//! Fetcher trait for the download engine.
//!
//! The engine only needs two things from the network: a best-effort length
//! probe and a streamed body it can read chunk by chunk. `HttpFetcher` is
//! the reqwest-backed implementation; tests substitute scripted fetchers.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_LENGTH;

use blackhole_core::EngineSettings;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,
    #[error("server returned status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A source of download bodies.
pub trait Fetcher: Send + Sync + 'static {
    type Body: Body;

    /// Length of the resource, if the server reports one.
    fn probe_length(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<u64>, FetchError>> + Send;

    /// Start a streaming GET. Non-success statuses are errors.
    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Body, FetchError>> + Send;
}

/// A response body read in arbitrary-sized frames.
pub trait Body: Send {
    fn content_length(&self) -> Option<u64>;

    /// Next frame, `None` at end of stream.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, FetchError>> + Send;
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// reqwest-backed fetcher sharing one pooled client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &EngineSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("blackhole/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn header_length(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

impl Fetcher for HttpFetcher {
    type Body = HttpBody;

    fn probe_length(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<u64>, FetchError>> + Send {
        let request = self.client.head(url);
        async move {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            Ok(header_length(response.headers()))
        }
    }

    fn open(&self, url: &str) -> impl Future<Output = Result<HttpBody, FetchError>> + Send {
        let request = self.client.get(url);
        async move {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            let content_length =
                header_length(response.headers()).or_else(|| response.content_length());
            Ok(HttpBody {
                response,
                content_length,
            })
        }
    }
}

/// Streaming body of an HTTP response. Dropping it releases the connection.
pub struct HttpBody {
    response: reqwest::Response,
    content_length: Option<u64>,
}

impl Body for HttpBody {
    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, FetchError>> + Send {
        async move { Ok(self.response.chunk().await?) }
    }
}
