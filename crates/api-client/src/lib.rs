//! Rate-limited asynchronous REST client for the Taiga ETL pipeline.
//!
//! Implements [`pipeline::ApiClient`] over `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Rate limiting, bounded concurrency, retry with
//! back-off, and HTTP status classification all live here. The stages see
//! only [`pipeline::ApiClient`] and the [`pipeline::PipelineError`] variants
//! this crate chooses.
//!
//! ## Request discipline
//!
//! Every request of one connection passes three gates, in order:
//!
//! 1. a semaphore bounding in-flight requests ([`ClientConfig::max_concurrency`]);
//! 2. the [`HourlyRateLimiter`] smoothing requests to the connection's quota;
//! 3. the [`Transport`] itself.
//!
//! Transient failures (429/5xx gateway statuses, timeouts, resets) are retried
//! per [`RetrySchedule`]; each retry passes the gates again and counts against
//! the same ceiling.

pub mod client;
pub mod rate_limit;
pub mod retry;
pub mod transport;

pub use client::{AsyncApiClient, ClientConfig};
pub use rate_limit::HourlyRateLimiter;
pub use retry::RetrySchedule;
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};
