//! Error, classification, and retry-policy types for the pipeline domain.
//!
//! [`PipelineError`] is the single error type crossing every port. Lower
//! layers (the API client, the stores) choose the variant; middle layers
//! (collector, extractor, converters) never reinterpret it, they only consult
//! [`PipelineError::class`] to decide whether to keep consuming their input.
//!
//! [`RetryPolicy`] is a cross-cutting concern: the API client asks every error
//! whether it is safe to retry and after what delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a stage must react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Aborts the run for the fingerprint. Never retried automatically.
    Fatal,
    /// One item is unavailable or invalid: log it, drop it, continue.
    Skip,
    /// Momentary failure the API client retries with back-off. Escalates to
    /// [`ErrorClass::Fatal`] once retries are exhausted.
    Transient,
}

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: network timeouts, connection resets, 429 and 5xx
///   gateway responses.
/// - `NonRetryable` errors: authentication failures, invalid configuration,
///   storage failures, skip signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// HTTP statuses that indicate a momentary server-side condition.
pub const TRANSIENT_HTTP_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Errors produced anywhere in the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The remote API rejected the credential (HTTP 401/403).
    ///
    /// Fatal to the whole run; retrying with the same credential cannot help.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description including the request path.
        message: String,
    },

    /// The specific remote item is unavailable (HTTP 404, or a status the
    /// request declared skippable). The run continues without it.
    #[error("Skipped: {reason}")]
    Skip {
        /// Why the item was skipped.
        reason: String,
    },

    /// A non-2xx response that is neither auth, skip, nor (once retried) transient.
    #[error("HTTP {status} from '{url}': {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Request path.
        url: String,
        /// Truncated response body or reason phrase.
        message: String,
        /// Server-requested delay before retrying, when supplied.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (DNS, connect, timeout, reset).
    #[error("Transport error for '{url}': {message}")]
    Transport {
        /// Request path.
        url: String,
        /// Underlying error description.
        message: String,
        /// Whether the failure is of a kind that may succeed on retry.
        retryable: bool,
    },

    /// A transient failure persisted through every allowed retry.
    #[error("Request to '{url}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Request path.
        url: String,
        /// Total attempts made, including the first.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// The run configuration, a URL template, or a params struct is invalid.
    ///
    /// Produced before any I/O; the run never starts with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A backing store failed to read or write.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// One raw payload could not be parsed into typed records.
    #[error("Malformed payload in '{table}': {message}")]
    MalformedPayload {
        /// Raw table the payload was read from.
        table: String,
        /// Parser error description.
        message: String,
    },

    /// The run-level cancellation signal fired.
    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Creates a [`PipelineError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a [`PipelineError::Storage`].
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a [`PipelineError::Skip`].
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
        }
    }

    /// Creates a [`PipelineError::MalformedPayload`] from any displayable cause.
    pub fn malformed(table: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::MalformedPayload {
            table: table.into(),
            message: cause.to_string(),
        }
    }

    /// Classifies this error for stage control flow.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Skip { .. } | Self::MalformedPayload { .. } => ErrorClass::Skip,
            Self::Http { status, .. } if TRANSIENT_HTTP_STATUSES.contains(status) => {
                ErrorClass::Transient
            }
            Self::Transport {
                retryable: true, ..
            } => ErrorClass::Transient,
            Self::Unauthorized { .. }
            | Self::Http { .. }
            | Self::Transport { .. }
            | Self::RetriesExhausted { .. }
            | Self::Configuration { .. }
            | Self::Storage { .. }
            | Self::Cancelled => ErrorClass::Fatal,
        }
    }

    /// Returns `true` if a stage may drop the item and continue.
    pub fn is_skip(&self) -> bool {
        self.class() == ErrorClass::Skip
    }

    /// Returns the retry policy implied by this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match (self.class(), self) {
            (ErrorClass::Transient, Self::Http { retry_after, .. }) => RetryPolicy::Retryable {
                after: *retry_after,
            },
            (ErrorClass::Transient, _) => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
