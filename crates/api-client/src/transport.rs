//! The wire seam of the client: sends one request and reports the raw outcome.
//!
//! [`Transport`] knows nothing about retries, rate limits, or status
//! classification. [`ReqwestTransport`] is the production implementation;
//! tests substitute scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ApiRequest, HttpMethod, RequestHeaders};
use thiserror::Error;

/// A raw HTTP response of any status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed `Retry-After` header (delta-seconds form only).
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

/// The request produced no response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be built (bad URL, unencodable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection reset, truncated body, or another I/O failure mid-exchange.
    #[error("transport failure: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether the same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Io(e.to_string())
        }
    }
}

/// Sends one request to the remote API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        headers: &RequestHeaders,
    ) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    /// Creates a transport for `endpoint` with a per-request `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taiga-etl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL of `path`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        headers: &RequestHeaders,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), self.url_for(&request.path))
            .query(&request.query);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}
