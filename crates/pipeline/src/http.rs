//! Transport-neutral request and response values exchanged with the
//! [`crate::ApiClient`] port.

use serde::de::DeserializeOwned;

use crate::PipelineError;

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// One outbound request, relative to the connection's endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the endpoint, without a leading slash (e.g. `api/v1/projects/42`).
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Additional statuses that mean "skip this item and continue" for this
    /// endpoint. 404 is always skippable.
    pub skip_statuses: Vec<u16>,
}

impl ApiRequest {
    /// A `GET` request for `path` with no query.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            skip_statuses: Vec::new(),
        }
    }

    /// Replaces the query parameters.
    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Declares extra statuses as skip-and-continue for this request.
    #[must_use]
    pub fn skipping(mut self, statuses: &[u16]) -> Self {
        self.skip_statuses.extend_from_slice(statuses);
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decodes the body as JSON into `T`.
    ///
    /// A body that does not decode is a [`PipelineError::MalformedPayload`]
    /// attributed to `context`.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> Result<T, PipelineError> {
        serde_json::from_slice(&self.body).map_err(|e| PipelineError::malformed(context, e))
    }
}

/// Headers the connection adds to every request (authentication).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders(Vec<(String, String)>);

impl RequestHeaders {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
    }

    /// Returns the value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns `true` if no headers are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
