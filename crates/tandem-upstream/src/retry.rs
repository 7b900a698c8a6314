//! Bounded retry policy for idempotent upstream reads (spec §4.C, §7).
//!
//! Mutating calls are never retried by this module — callers must not route
//! write requests through [`with_retry`].

use std::time::Duration;

use rand::Rng;
use tandem_core::{Error, ErrorKind};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(2);
const MAX_TOTAL_WAIT: Duration = Duration::from_secs(5);

/// Whether a failed attempt is worth retrying at all.
pub fn is_retryable(err: &Error) -> bool {
	match err.kind {
		ErrorKind::Network => true,
		ErrorKind::RateLimit => true,
		ErrorKind::Unknown => matches!(err.status, 500 | 502 | 503 | 504),
		_ => false,
	}
}

/// Computes the delay before the next attempt.
///
/// Honors an upstream-supplied `Retry-After` when present, capped so the
/// cumulative wait across all attempts never exceeds [`MAX_TOTAL_WAIT`].
/// Otherwise falls back to exponential backoff from [`BASE_BACKOFF`],
/// doubling per attempt, capped at [`MAX_BACKOFF`], jittered by ±50%.
fn next_delay(attempt: u32, retry_after: Option<Duration>, elapsed: Duration) -> Duration {
	let remaining_budget = MAX_TOTAL_WAIT.saturating_sub(elapsed);
	if let Some(requested) = retry_after {
		return requested.min(remaining_budget);
	}
	let exp = BASE_BACKOFF.saturating_mul(1 << attempt.min(8)).min(MAX_BACKOFF);
	let jittered = jitter(exp);
	jittered.min(remaining_budget)
}

fn jitter(base: Duration) -> Duration {
	let factor = rand::thread_rng().gen_range(0.5..=1.5);
	Duration::from_secs_f64(base.as_secs_f64() * factor)
}

/// Runs `attempt_fn` up to [`MAX_ATTEMPTS`] times, sleeping between
/// attempts per [`next_delay`], stopping early on a non-retryable error, a
/// success, or an exhausted total-wait budget.
///
/// `retry_after_of` extracts a `Retry-After`-derived duration from a failed
/// attempt's error, if the caller parsed one from response headers.
pub async fn with_retry<T, F, Fut>(retry_after_of: impl Fn(&Error) -> Option<Duration>, mut attempt_fn: F) -> Result<T, Error>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, Error>>,
{
	let mut elapsed = Duration::ZERO;
	let mut last_err = None;
	for attempt in 0..MAX_ATTEMPTS {
		match attempt_fn().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				if !is_retryable(&err) || attempt + 1 == MAX_ATTEMPTS {
					return Err(err);
				}
				if elapsed >= MAX_TOTAL_WAIT {
					return Err(err);
				}
				let delay = next_delay(attempt, retry_after_of(&err), elapsed);
				last_err = Some(err);
				tokio::time::sleep(delay).await;
				elapsed += delay;
			}
		}
	}
	Err(last_err.unwrap_or_else(|| Error::network("retry attempts exhausted")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[test]
	fn network_errors_are_retryable() {
		assert!(is_retryable(&Error::network("boom")));
	}

	#[test]
	fn validation_errors_are_not_retryable() {
		assert!(!is_retryable(&Error::validation("bad input")));
	}

	#[test]
	fn server_error_status_is_retryable() {
		assert!(is_retryable(&Error::from_status(503, false, "unavailable")));
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let d0 = next_delay(0, None, Duration::ZERO);
		let d5 = next_delay(5, None, Duration::ZERO);
		assert!(d0 >= Duration::from_millis(125) && d0 <= Duration::from_millis(375));
		assert!(d5 <= Duration::from_secs(3));
	}

	#[test]
	fn retry_after_is_capped_by_remaining_budget() {
		let delay = next_delay(0, Some(Duration::from_secs(10)), Duration::from_secs(4));
		assert_eq!(delay, Duration::from_secs(1));
	}

	#[tokio::test(start_paused = true)]
	async fn stops_retrying_on_non_retryable_error() {
		let calls = AtomicU32::new(0);
		let result: Result<(), Error> = with_retry(
			|_| None,
			|| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Err(Error::validation("nope")) }
			},
		)
		.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn succeeds_after_transient_failures() {
		let calls = AtomicU32::new(0);
		let result = with_retry(
			|_| None,
			|| {
				let n = calls.fetch_add(1, Ordering::SeqCst);
				async move {
					if n < 1 {
						Err(Error::network("transient"))
					} else {
						Ok(42)
					}
				}
			},
		)
		.await;
		assert_eq!(result.unwrap(), 42);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn gives_up_after_max_attempts() {
		let calls = AtomicU32::new(0);
		let result: Result<(), Error> = with_retry(
			|_| None,
			|| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Err(Error::network("always fails")) }
			},
		)
		.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
	}
}
