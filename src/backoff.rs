//! Wait duration before the next attempt.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::{HeaderMap, HeaderName, RETRY_AFTER};

use crate::{AttemptOutcome, RetryConfig};

pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Computes the delay before retry number `attempt` (0 for the first retry).
///
/// For 429, 403 and 5xx responses the server's own hints win:
/// `Retry-After` seconds first, then the `X-Ratelimit-Reset` instant when
/// `X-Ratelimit-Remaining` is zero. Anything else backs off exponentially
/// from `min_backoff`, capped at `max_backoff`. Server-directed waits are
/// not capped.
pub fn backoff(config: &RetryConfig, attempt: u32, outcome: &AttemptOutcome<'_>) -> Duration {
    backoff_at(config, attempt, outcome, SystemTime::now())
}

/// [`backoff`] against an explicit clock.
pub fn backoff_at(
    config: &RetryConfig,
    attempt: u32,
    outcome: &AttemptOutcome<'_>,
    now: SystemTime,
) -> Duration {
    if let AttemptOutcome::Response { status, headers } = *outcome {
        if status == 429 || status == 403 || status >= 500 {
            if let Some(wait) = server_directed_wait(headers, now) {
                return wait;
            }
        }
    }
    exponential(config.min_backoff, config.max_backoff, attempt)
}

fn server_directed_wait(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    if let Some(secs) = header_i64(headers, &RETRY_AFTER) {
        return Some(Duration::from_secs(secs.max(0).unsigned_abs()));
    }

    // Only a present header counts as a rate limit signal. A present but
    // unparseable value reads as zero remaining.
    let remaining = headers.get(&RATELIMIT_REMAINING)?;
    if parse_i64(remaining.to_str().ok()).unwrap_or(0) != 0 {
        return None;
    }

    let reset_secs = header_i64(headers, &RATELIMIT_RESET).unwrap_or(0).max(0);
    let reset = UNIX_EPOCH + Duration::from_secs(reset_secs.unsigned_abs());
    // A reset in the past (clock skew) means no wait.
    Some(reset.duration_since(now).unwrap_or(Duration::ZERO))
}

fn header_i64(headers: &HeaderMap, name: &HeaderName) -> Option<i64> {
    parse_i64(headers.get(name).and_then(|value| value.to_str().ok()))
}

fn parse_i64(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

/// `min * 2^attempt`, falling back to `max` on overflow or lost precision.
fn exponential(min: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let nanos = 2f64.powi(exponent) * min.as_nanos() as f64;
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return max;
    }
    let sleep = Duration::from_nanos(nanos as u64);
    // Past 2^53 the product may no longer be a whole number of nanoseconds.
    if sleep.as_nanos() as f64 != nanos || sleep > max {
        return max;
    }
    sleep
}
