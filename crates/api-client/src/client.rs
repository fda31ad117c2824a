//! [`AsyncApiClient`]: rate-limited, concurrency-bounded, retrying
//! implementation of [`pipeline::ApiClient`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    ApiClient, ApiRequest, ApiResponse, Connection, PipelineError, RequestHeaders, RetryPolicy,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::rate_limit::HourlyRateLimiter;
use crate::retry::{millis, RetrySchedule};
use crate::transport::{ReqwestTransport, Transport, TransportResponse};

/// Longest slice of an error body kept in [`PipelineError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// Tuning for [`AsyncApiClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum requests in flight at once.
    pub max_concurrency: usize,
    /// Per-request timeout.
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Back-off schedule for transient failures.
    pub retry: RetrySchedule,
    /// Ceiling used when the connection declares no quota.
    pub default_rate_limit_per_hour: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            timeout: Duration::from_secs(30),
            retry: RetrySchedule::default(),
            default_rate_limit_per_hour: 18_000,
        }
    }
}

/// Shared client for one connection.
///
/// One instance is built per connection and shared (via `Arc`) by every
/// stage of a run, so all requests count against one rate ceiling and one
/// concurrency bound.
pub struct AsyncApiClient {
    connection: Arc<dyn Connection>,
    transport: Arc<dyn Transport>,
    limiter: HourlyRateLimiter,
    in_flight: Semaphore,
    retry: RetrySchedule,
}

impl std::fmt::Debug for AsyncApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncApiClient")
            .field("endpoint", &self.connection.endpoint())
            .field("rate_limit_per_hour", &self.limiter.per_hour())
            .field("available_permits", &self.in_flight.available_permits())
            .finish_non_exhaustive()
    }
}

impl AsyncApiClient {
    /// Builds a client for `connection` over HTTP.
    pub fn new(
        connection: Arc<dyn Connection>,
        config: ClientConfig,
    ) -> Result<Self, PipelineError> {
        let endpoint = connection.endpoint().trim();
        if endpoint.is_empty() {
            return Err(PipelineError::configuration("connection endpoint is empty"));
        }
        let transport = ReqwestTransport::new(endpoint, config.timeout).map_err(|e| {
            PipelineError::configuration(format!("cannot build HTTP client: {e}"))
        })?;
        Self::with_transport(connection, config, Arc::new(transport))
    }

    /// Builds a client over an arbitrary [`Transport`].
    pub fn with_transport(
        connection: Arc<dyn Connection>,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, PipelineError> {
        if config.max_concurrency == 0 {
            return Err(PipelineError::configuration(
                "max_concurrency must be at least 1",
            ));
        }
        let per_hour = match connection.rate_limit_per_hour() {
            Some(n) if n > 0 => n,
            _ if config.default_rate_limit_per_hour > 0 => config.default_rate_limit_per_hour,
            _ => {
                return Err(PipelineError::configuration(
                    "no rate limit configured for the connection and no default set",
                ))
            }
        };
        debug!(
            endpoint = connection.endpoint(),
            per_hour,
            max_concurrency = config.max_concurrency,
            "api client configured"
        );
        Ok(Self {
            connection,
            transport,
            limiter: HourlyRateLimiter::new(per_hour),
            in_flight: Semaphore::new(config.max_concurrency),
            retry: config.retry,
        })
    }

    /// Effective hourly ceiling.
    pub fn rate_limit_per_hour(&self) -> u32 {
        self.limiter.per_hour()
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        headers: &RequestHeaders,
    ) -> Result<ApiResponse, PipelineError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| PipelineError::Cancelled)?;
        self.limiter.acquire().await;

        let response = self
            .transport
            .send(request, headers)
            .await
            .map_err(|e| PipelineError::Transport {
                url: request.path.clone(),
                message: e.to_string(),
                retryable: e.is_retryable(),
            })?;
        classify(request, response)
    }
}

#[async_trait]
impl ApiClient for AsyncApiClient {
    #[instrument(skip(self, request), fields(method = request.method.as_str(), path = %request.path))]
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, PipelineError> {
        let mut headers = RequestHeaders::new();
        self.connection.apply_authentication(&mut headers)?;

        let mut retries = 0;
        loop {
            let err = match self.attempt(&request, &headers).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            let RetryPolicy::Retryable { after } = err.retry_policy() else {
                return Err(err);
            };
            if !self.retry.should_retry(retries) {
                return Err(PipelineError::RetriesExhausted {
                    url: request.path.clone(),
                    attempts: retries + 1,
                    last_error: err.to_string(),
                });
            }
            retries += 1;
            let delay = self
                .retry
                .delay_for_attempt(retries)
                .max(after.unwrap_or_default());
            warn!(error = %err, retry = retries, delay_ms = delay.as_millis() as u64, "retrying request");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Maps a raw response onto the pipeline's error taxonomy.
fn classify(request: &ApiRequest, response: TransportResponse) -> Result<ApiResponse, PipelineError> {
    let status = response.status;
    match status {
        200..=299 => Ok(ApiResponse {
            status,
            body: response.body,
        }),
        401 | 403 => Err(PipelineError::Unauthorized {
            message: format!(
                "HTTP {status} from '{}': authentication failed, check the bearer token",
                request.path
            ),
        }),
        404 => Err(PipelineError::skip(format!(
            "HTTP 404 from '{}': not found",
            request.path
        ))),
        s if request.skip_statuses.contains(&s) => Err(PipelineError::skip(format!(
            "HTTP {s} from '{}'",
            request.path
        ))),
        _ => Err(PipelineError::Http {
            status,
            url: request.path.clone(),
            message: truncate_body(&response.body),
            retry_after: response.retry_after,
        }),
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use pipeline::ErrorClass;

    use super::*;
    use crate::transport::TransportError;

    struct TestConnection {
        token: &'static str,
        rate: Option<u32>,
    }

    impl Connection for TestConnection {
        fn endpoint(&self) -> &str {
            "https://taiga.test"
        }

        fn rate_limit_per_hour(&self) -> Option<u32> {
            self.rate
        }

        fn apply_authentication(&self, headers: &mut RequestHeaders) -> Result<(), PipelineError> {
            headers.set("Authorization", format!("Bearer {}", self.token));
            Ok(())
        }
    }

    type Scripted = Result<TransportResponse, TransportError>;

    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        seen: Mutex<Vec<(ApiRequest, RequestHeaders)>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                seen: Mutex::default(),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: &ApiRequest,
            headers: &RequestHeaders,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().push((request.clone(), headers.clone()));
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Io("script exhausted".into())))
        }
    }

    fn status(status: u16) -> Scripted {
        Ok(TransportResponse {
            status,
            retry_after: None,
            body: format!("{{\"status\":{status}}}").into_bytes(),
        })
    }

    fn client(transport: Arc<ScriptedTransport>) -> AsyncApiClient {
        AsyncApiClient::with_transport(
            Arc::new(TestConnection {
                token: "secret",
                rate: None,
            }),
            ClientConfig::default(),
            transport,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_statuses_are_retried_then_succeed() {
        let transport = ScriptedTransport::new(vec![status(503), status(502), status(200)]);
        let client = client(Arc::clone(&transport));

        let response = client.request(ApiRequest::get("api/v1/projects/42")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let transport = ScriptedTransport::new(vec![status(500); 10]);
        let client = client(Arc::clone(&transport));

        let err = client.request(ApiRequest::get("api/v1/projects")).await.unwrap_err();

        assert!(
            matches!(err, PipelineError::RetriesExhausted { attempts: 4, .. }),
            "{err:?}"
        );
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_timeouts_are_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout("30s".into())),
            status(200),
        ]);
        let client = client(Arc::clone(&transport));

        assert!(client.request(ApiRequest::get("x")).await.is_ok());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_is_not_retried() {
        for code in [401, 403] {
            let transport = ScriptedTransport::new(vec![status(code), status(200)]);
            let client = client(Arc::clone(&transport));

            let err = client.request(ApiRequest::get("api/v1/users/me")).await.unwrap_err();

            assert!(matches!(err, PipelineError::Unauthorized { .. }), "{err:?}");
            assert_eq!(transport.calls(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_and_declared_statuses_skip() {
        let transport = ScriptedTransport::new(vec![status(404), status(400), status(400)]);
        let client = client(Arc::clone(&transport));

        let not_found = client.request(ApiRequest::get("a")).await.unwrap_err();
        assert!(not_found.is_skip());

        let declared = client
            .request(ApiRequest::get("b").skipping(&[400]))
            .await
            .unwrap_err();
        assert!(declared.is_skip());

        let undeclared = client.request(ApiRequest::get("c")).await.unwrap_err();
        assert!(
            matches!(undeclared, PipelineError::Http { status: 400, .. }),
            "{undeclared:?}"
        );
        assert_eq!(undeclared.class(), ErrorClass::Fatal);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_is_applied_to_every_attempt() {
        let transport = ScriptedTransport::new(vec![status(503), status(200)]);
        let client = client(Arc::clone(&transport));

        client.request(ApiRequest::get("x")).await.unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen.len(), 2);
        for (_, headers) in seen.iter() {
            assert_eq!(headers.get("authorization"), Some("Bearer secret"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_extends_backoff() {
        let transport = ScriptedTransport::new(vec![
            Ok(TransportResponse {
                status: 429,
                retry_after: Some(Duration::from_secs(30)),
                body: Vec::new(),
            }),
            status(200),
        ]);
        let client = client(Arc::clone(&transport));
        let start = tokio::time::Instant::now();

        client.request(ApiRequest::get("x")).await.unwrap();

        assert!(tokio::time::Instant::now() - start >= Duration::from_secs(30));
    }

    /// Answers 200 after a delay, recording the most calls seen in flight.
    #[derive(Default)]
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(
            &self,
            _request: &ApiRequest,
            _headers: &RequestHeaders,
        ) -> Result<TransportResponse, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: 200,
                retry_after: None,
                body: Vec::new(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_requests_are_bounded_by_max_concurrency() {
        let transport = Arc::new(SlowTransport::default());
        let client = Arc::new(
            AsyncApiClient::with_transport(
                Arc::new(TestConnection {
                    token: "t",
                    rate: Some(3_600_000),
                }),
                ClientConfig {
                    max_concurrency: 3,
                    ..ClientConfig::default()
                },
                transport.clone(),
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..10)
            .map(|n| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.request(ApiRequest::get(format!("items/{n}"))).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status, 200);
        }

        assert_eq!(transport.peak.load(Ordering::SeqCst), 3);
        assert_eq!(transport.in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_connection_quota_overrides_default() {
        let transport = ScriptedTransport::new(vec![]);
        let client = AsyncApiClient::with_transport(
            Arc::new(TestConnection {
                token: "t",
                rate: Some(120),
            }),
            ClientConfig::default(),
            transport,
        )
        .unwrap();
        assert_eq!(client.rate_limit_per_hour(), 120);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let err = AsyncApiClient::with_transport(
            Arc::new(TestConnection {
                token: "t",
                rate: None,
            }),
            ClientConfig {
                max_concurrency: 0,
                ..ClientConfig::default()
            },
            ScriptedTransport::new(vec![]),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_error_body_is_truncated() {
        let long = "x".repeat(2000);
        let text = truncate_body(long.as_bytes());
        assert_eq!(text.chars().count(), MAX_ERROR_BODY + 1);
    }
}
