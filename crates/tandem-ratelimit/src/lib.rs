//! Observes upstream rate-limit headers and derives a safe poll cadence
//! (spec §4.A).

use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

/// The last observed rate-limit tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
	pub remaining: u32,
	pub limit: u32,
	pub reset_at: Option<DateTime<Utc>>,
}

impl Default for Snapshot {
	/// Before anything has been observed, assume the limit is wide open so
	/// the first real request isn't blocked by an artificial floor.
	fn default() -> Self {
		Self {
			remaining: u32::MAX,
			limit: u32::MAX,
			reset_at: None,
		}
	}
}

/// Thread-safe holder for the most recently observed rate-limit state.
///
/// Cheap to clone and share between the poller and the upstream client —
/// backed by `arc-swap` rather than a mutex, since reads vastly outnumber
/// writes (one write per HTTP response, many reads per poll-interval
/// decision).
#[derive(Debug, Clone)]
pub struct RateLimitTracker {
	state: std::sync::Arc<ArcSwap<Snapshot>>,
}

impl Default for RateLimitTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl RateLimitTracker {
	pub fn new() -> Self {
		Self {
			state: std::sync::Arc::new(ArcSwap::from_pointee(Snapshot::default())),
		}
	}

	pub fn snapshot(&self) -> Snapshot {
		**self.state.load()
	}

	/// Records an observed `(remaining, limit, reset)` tuple from response
	/// headers.
	pub fn observe(&self, remaining: u32, limit: u32, reset_at: Option<DateTime<Utc>>) {
		self.state.store(std::sync::Arc::new(Snapshot {
			remaining,
			limit,
			reset_at,
		}));
	}

	/// Parses the standard `X-RateLimit-{Remaining,Limit,Reset}` headers
	/// (reset as Unix seconds) and records them.
	pub fn observe_headers(&self, remaining: &str, limit: &str, reset_unix: &str) {
		let remaining: u32 = remaining.parse().unwrap_or(u32::MAX);
		let limit: u32 = limit.parse().unwrap_or(u32::MAX);
		let reset_at = reset_unix
			.parse::<i64>()
			.ok()
			.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
		self.observe(remaining, limit, reset_at);
	}

	/// False when the tracker believes fewer than 100 calls remain in the
	/// current window.
	pub fn should_poll(&self) -> bool {
		self.snapshot().remaining >= 100
	}

	/// Maps `base` to a safe cadence given the last observed remaining
	/// quota, per the thresholds in spec §4.A.
	pub fn safe_interval(&self, base: Duration) -> Duration {
		let snapshot = self.snapshot();
		if snapshot.remaining < 100 {
			return self.wait_until_reset().unwrap_or(Duration::from_secs(5 * 60));
		}
		if snapshot.remaining < 200 {
			return base.max(Duration::from_secs(120));
		}
		if snapshot.remaining < 500 {
			return base.max(Duration::from_secs(60));
		}
		base
	}

	fn wait_until_reset(&self) -> Option<Duration> {
		let reset_at = self.snapshot().reset_at?;
		let now = Utc::now();
		let delta = reset_at - now;
		delta.to_std().ok()
	}
}

/// Parses a `Retry-After` header value, which per HTTP may be either an
/// integer number of seconds or an HTTP-date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
	let value = value.trim();
	if let Ok(secs) = value.parse::<u64>() {
		return Some(Duration::from_secs(secs));
	}
	parse_http_date(value).map(|when| {
		let delta = when - Utc::now();
		delta.to_std().unwrap_or(Duration::ZERO)
	})
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc2822(value)
		.ok()
		.map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn should_poll_false_when_remaining_under_100() {
		let tracker = RateLimitTracker::new();
		tracker.observe(50, 5000, None);
		assert!(!tracker.should_poll());
	}

	#[test]
	fn should_poll_true_when_remaining_at_100() {
		let tracker = RateLimitTracker::new();
		tracker.observe(100, 5000, None);
		assert!(tracker.should_poll());
	}

	#[test]
	fn safe_interval_widens_between_200_and_500() {
		let tracker = RateLimitTracker::new();
		tracker.observe(300, 5000, None);
		assert_eq!(tracker.safe_interval(Duration::from_secs(15)), Duration::from_secs(60));
	}

	#[test]
	fn safe_interval_widens_between_100_and_200() {
		let tracker = RateLimitTracker::new();
		tracker.observe(150, 5000, None);
		assert_eq!(tracker.safe_interval(Duration::from_secs(15)), Duration::from_secs(120));
	}

	#[test]
	fn safe_interval_passes_base_through_when_plentiful() {
		let tracker = RateLimitTracker::new();
		tracker.observe(4000, 5000, None);
		assert_eq!(tracker.safe_interval(Duration::from_secs(15)), Duration::from_secs(15));
	}

	#[test]
	fn safe_interval_falls_back_to_five_minute_floor_without_reset() {
		let tracker = RateLimitTracker::new();
		tracker.observe(10, 5000, None);
		assert_eq!(tracker.safe_interval(Duration::from_secs(15)), Duration::from_secs(5 * 60));
	}

	#[test]
	fn retry_after_parses_integer_seconds() {
		assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
	}

	#[test]
	fn retry_after_rejects_garbage() {
		assert_eq!(parse_retry_after("not-a-date"), None);
	}
}
