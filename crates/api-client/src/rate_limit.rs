//! Hourly request ceiling shared by every in-flight request of one connection.
//!
//! Requests are smoothed: consecutive slots are spaced `1h / N` apart instead
//! of being released in bursts. A log of the last `N` reserved slots enforces
//! the rolling-window bound exactly, independent of rounding in the interval.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(3600);

/// Smoothing rate limiter with a hard rolling one-hour ceiling.
#[derive(Debug)]
pub struct HourlyRateLimiter {
    per_hour: u32,
    interval: Duration,
    state: Mutex<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    next_slot: Instant,
    /// Reserved slots, oldest first; never longer than `per_hour`.
    issued: VecDeque<Instant>,
}

impl HourlyRateLimiter {
    /// Creates a limiter allowing at most `per_hour` requests in any rolling
    /// hour. A ceiling of 0 is treated as 1.
    pub fn new(per_hour: u32) -> Self {
        let per_hour = per_hour.max(1);
        Self {
            per_hour,
            interval: WINDOW / per_hour,
            state: Mutex::new(LimiterState {
                next_slot: Instant::now(),
                issued: VecDeque::with_capacity(per_hour.min(4096) as usize),
            }),
        }
    }

    /// The configured ceiling.
    pub fn per_hour(&self) -> u32 {
        self.per_hour
    }

    /// Minimum spacing between consecutive requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until this caller may issue one request.
    ///
    /// Slots are reserved in call order under a short lock and the wait
    /// happens outside it, so concurrent callers queue without serialising
    /// on the lock. Dropping the future after the slot is reserved forfeits
    /// the slot.
    pub async fn acquire(&self) {
        let slot = self.reserve();
        tokio::time::sleep_until(slot).await;
    }

    fn reserve(&self) -> Instant {
        let mut state = self.state.lock();
        let mut slot = state.next_slot.max(Instant::now());
        if state.issued.len() >= self.per_hour as usize {
            if let Some(oldest) = state.issued.pop_front() {
                slot = slot.max(oldest + WINDOW);
            }
        }
        state.issued.push_back(slot);
        state.next_slot = slot + self.interval;
        slot
    }
}
