//! Quota accounting and retry backoff for GitHub API calls
//!
//! GitHub publishes a per-credential call budget through `x-ratelimit-*`
//! response headers. The limiter tracks that budget, gates each call on it,
//! and spaces out retries after 429/5xx responses using a fixed, finite
//! backoff plan. Network errors are not its concern; they bypass retry.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{DefaultDirectRateLimiter, Quota};
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Serialize;

use crate::error::ApiError;

/// Backoff delays in seconds, consumed one per failed attempt.
pub const DEFAULT_RETRY_DELAYS: [u64; 5] = [1, 2, 5, 10, 30];

/// Hourly core quota for anonymous callers.
pub const UNAUTHENTICATED_LIMIT: u32 = 60;

/// Hourly core quota for token-authenticated callers.
pub const AUTHENTICATED_LIMIT: u32 = 5000;

/// Length of GitHub's rate-limit window.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Time source for the limiter, swappable in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Remaining call budget as last reported (or locally accounted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaState {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

impl QuotaState {
    /// A full budget that resets one window after `now`.
    pub fn full(limit: u32, now: DateTime<Utc>) -> Self {
        let limit = limit.max(1);
        Self {
            remaining: limit,
            limit,
            reset_at: now + window(),
        }
    }

    /// Time left until `reset_at`, zero if already past.
    pub fn wait_time(&self, now: DateTime<Utc>) -> Duration {
        (self.reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Restore the full budget once the window has elapsed.
    fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.reset_at {
            return false;
        }
        self.remaining = self.limit;
        while self.reset_at <= now {
            self.reset_at += window();
        }
        true
    }

    fn apply(&mut self, headers: &QuotaHeaders) {
        if let Some(limit) = headers.limit {
            self.limit = limit.max(1);
        }
        if let Some(remaining) = headers.remaining {
            self.remaining = remaining;
        }
        if let Some(reset_at) = headers.reset.and_then(|ts| DateTime::from_timestamp(ts, 0)) {
            self.reset_at = reset_at;
        }
        self.remaining = self.remaining.min(self.limit);
    }
}

fn window() -> chrono::Duration {
    chrono::Duration::from_std(QUOTA_WINDOW).unwrap_or_else(|_| chrono::Duration::hours(1))
}

/// Quota-related fields extracted from a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaHeaders {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    /// Epoch seconds
    pub reset: Option<i64>,
    /// `retry-after` seconds
    pub retry_after: Option<u64>,
}

impl QuotaHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        fn parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<T>().ok())
        }

        Self {
            remaining: parse(headers, "x-ratelimit-remaining"),
            limit: parse(headers, "x-ratelimit-limit"),
            reset: parse(headers, "x-ratelimit-reset"),
            retry_after: parse(headers, "retry-after"),
        }
    }

    /// GitHub signals an exhausted primary quota with 403 + remaining 0.
    pub fn is_quota_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Finite backoff schedule with a cursor.
///
/// A call may be attempted at most `len()` times. Failure `n` (1-based)
/// waits `delays[n - 1]` before the next attempt; the `len()`-th failure
/// ends the plan.
#[derive(Debug, Clone)]
pub struct RetryPlan {
    delays: Vec<Duration>,
    failures: usize,
}

impl Default for RetryPlan {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_DELAYS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        )
    }
}

impl RetryPlan {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays, failures: 0 }
    }

    /// Maximum number of attempts for one call.
    pub fn len(&self) -> usize {
        self.delays.len().max(1)
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Record a failure and return the delay before the next attempt,
    /// or `None` when no attempts remain.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.len() {
            return None;
        }
        self.delays.get(self.failures - 1).copied()
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Outcome of [`RateLimiter::record_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The call completed; the caller interprets the status.
    Done,
    /// Transient failure; retry after the scheduled delay.
    Retry(Duration),
    /// Transient failure with no attempts left.
    Exhausted { attempts: usize, status: StatusCode },
}

/// Proof that a call was admitted by the limiter.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    pub remaining: u32,
}

/// Quota state shared between limiters drawing from the same credentials.
pub type SharedQuota = Arc<Mutex<QuotaState>>;

#[derive(Debug)]
struct RetryState {
    plan: RetryPlan,
    pending: Option<Duration>,
}

/// Gate for outgoing calls.
pub struct RateLimiter {
    quota: SharedQuota,
    retry: Mutex<RetryState>,
    pacer: Option<DefaultDirectRateLimiter>,
    clock: Arc<dyn Clock>,
    max_quota_wait: Option<Duration>,
}

impl RateLimiter {
    /// Create a limiter with its own quota state and the system clock.
    pub fn new(initial: QuotaState, plan: RetryPlan) -> Self {
        Self {
            quota: Arc::new(Mutex::new(initial)),
            retry: Mutex::new(RetryState {
                plan,
                pending: None,
            }),
            pacer: None,
            clock: Arc::new(SystemClock),
            max_quota_wait: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Space consecutive calls at least `interval` apart.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.pacer = Quota::with_period(interval)
            .map(|q| q.allow_burst(NonZeroU32::MIN))
            .map(governor::RateLimiter::direct);
        self
    }

    /// Fail with `RateLimitExceeded` rather than wait longer than `max`
    /// for the quota window to reset.
    pub fn with_max_quota_wait(mut self, max: Duration) -> Self {
        self.max_quota_wait = Some(max);
        self
    }

    /// Draw from a quota shared with other limiters.
    pub fn with_shared_quota(mut self, quota: SharedQuota) -> Self {
        self.quota = quota;
        self
    }

    /// Handle to this limiter's quota, for sharing.
    pub fn shared_quota(&self) -> SharedQuota {
        Arc::clone(&self.quota)
    }

    /// Snapshot of the current quota.
    pub fn status(&self) -> QuotaState {
        *lock(&self.quota)
    }

    /// Replace the quota wholesale (e.g. from the `/rate_limit` endpoint).
    pub fn set_status(&self, quota: QuotaState) {
        let mut state = lock(&self.quota);
        *state = quota;
        state.remaining = state.remaining.min(state.limit);
    }

    /// Wait for any scheduled backoff and for available quota, then take
    /// one unit of it.
    pub async fn acquire(&self) -> Result<Permit, ApiError> {
        let pending = lock(&self.retry).pending.take();
        if let Some(delay) = pending {
            debug!("Backing off for {:?}", delay);
            self.clock.sleep(delay).await;
        }

        let permit = loop {
            let wait = {
                let mut quota = lock(&self.quota);
                let now = self.clock.now();
                if quota.roll_over(now) {
                    debug!("Quota window reset, {} calls available", quota.remaining);
                }
                if quota.remaining > 0 {
                    quota.remaining -= 1;
                    break Permit {
                        remaining: quota.remaining,
                    };
                }
                let wait = quota.wait_time(now);
                if let Some(max) = self.max_quota_wait {
                    if wait > max {
                        return Err(ApiError::RateLimitExceeded {
                            remaining: quota.remaining,
                            limit: quota.limit,
                            reset_at: quota.reset_at,
                            last_status: None,
                        });
                    }
                }
                wait
            };

            warn!(
                "GitHub API quota exhausted, waiting {}s for reset",
                wait.as_secs()
            );
            self.clock.sleep(wait).await;
        };

        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }

        Ok(permit)
    }

    /// Fold a response into the quota and retry state. `message` is the
    /// error text GitHub sent with a 403, if any.
    pub fn record_response(
        &self,
        status: StatusCode,
        headers: &QuotaHeaders,
        message: Option<&str>,
    ) -> Verdict {
        lock(&self.quota).apply(headers);

        let transient = is_transient(status, headers, message);

        let mut retry = lock(&self.retry);
        if !transient {
            retry.plan.reset();
            return Verdict::Done;
        }

        match retry.plan.next_delay() {
            Some(delay) => {
                let delay = headers
                    .retry_after
                    .map(Duration::from_secs)
                    .map_or(delay, |after| after.max(delay));
                debug!(
                    "Transient {} (failure {}), retrying in {:?}",
                    status,
                    retry.plan.failures(),
                    delay
                );
                retry.pending = Some(delay);
                Verdict::Retry(delay)
            }
            None => {
                let attempts = retry.plan.failures();
                retry.plan.reset();
                retry.pending = None;
                Verdict::Exhausted { attempts, status }
            }
        }
    }

    /// Error describing the current quota, for exhausted retries.
    pub fn exceeded(&self, last_status: Option<StatusCode>) -> ApiError {
        let quota = self.status();
        ApiError::RateLimitExceeded {
            remaining: quota.remaining,
            limit: quota.limit,
            reset_at: quota.reset_at,
            last_status: last_status.map(|s| s.as_u16()),
        }
    }
}

/// 429 and 5xx always retry. A 403 retries when GitHub marks it as a
/// primary (remaining 0) or secondary (`retry-after`, "rate limit" message)
/// rate limit.
fn is_transient(status: StatusCode, headers: &QuotaHeaders, message: Option<&str>) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && (headers.is_quota_exhausted()
            || headers.retry_after.is_some()
            || message.is_some_and(|m| m.to_ascii_lowercase().contains("rate limit")))
}

// The guarded data stays consistent even if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
