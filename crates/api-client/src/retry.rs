//! Bounded exponential back-off for transient request failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry schedule applied to errors whose
/// [`pipeline::RetryPolicy`] is `Retryable`.
///
/// Attempt `n` (1-based retry number) waits
/// `min(initial_backoff * multiplier^(n-1), max_backoff)`, or the
/// server-requested `Retry-After` when that is longer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySchedule {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetrySchedule {
    /// A schedule that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based). Zero for `retry == 0`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = delay.min(self.max_backoff.as_secs_f64());
        Duration::try_from_secs_f64(capped.max(0.0)).unwrap_or(self.max_backoff)
    }

    /// Returns `true` if another retry is allowed after `retries_done` retries.
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }
}

/// Serialises a [`Duration`] as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
