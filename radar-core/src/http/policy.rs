//! Retry policy: which failures are worth retrying and how long to wait.

use std::time::Duration;

use backoff::backoff::Backoff;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// `min(base * 2^attempt, cap)`, without jitter.
#[derive(Debug, Clone)]
pub struct CappedExponential {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl CappedExponential {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

impl Backoff for CappedExponential {
    fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Check if an HTTP status code indicates a transient error.
///
/// Rate limiting and every 5xx are retried; any other 4xx is final.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Parse a `Retry-After` header (delta-seconds or HTTP-date), clamped to `cap`.
pub fn retry_after(headers: &HeaderMap, cap: Duration) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    let delay = match raw.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => {
            let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
            (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        }
    };
    Some(delay.min(cap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = CappedExponential::new(Duration::from_millis(500), Duration::from_secs(30));
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_reset() {
        let mut policy = CappedExponential::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(200)));
        policy.reset();
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_retry_after_seconds_is_clamped() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(
            retry_after(&headers, Duration::from_secs(30)),
            Some(Duration::from_secs(2))
        );
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3600"));
        assert_eq!(
            retry_after(&headers, Duration::from_secs(30)),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_retry_after_missing_or_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers, Duration::from_secs(30)), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers, Duration::from_secs(30)), None);
    }

    #[test]
    fn test_retry_after_past_http_date_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(
            retry_after(&headers, Duration::from_secs(30)),
            Some(Duration::ZERO)
        );
    }
}
