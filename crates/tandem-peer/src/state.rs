//! The connection and reconnection state machines (spec §4.F, §8
//! invariant 7), kept as pure logic so it's testable without a transport.

use std::time::Duration;

/// `{new → connecting → connected → (failed|closed)}` (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
	New,
	Connecting,
	Connected,
	Failed,
	Closed,
}

const MAX_RETRIES: u32 = 5;
const BASE_BACKOFF_MS: u64 = 1000;

/// Tracks the reconnection attempt counter, resetting on a successful
/// connect.
#[derive(Debug, Default)]
pub struct ReconnectState {
	retries: u32,
}

/// What the caller should do after a disconnect is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
	/// Wait this long, then try `connect()` again.
	RetryAfter(Duration),
	/// The 6th consecutive failure: surface `failed` to subscribers and
	/// stop retrying.
	GiveUp,
}

impl ReconnectState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Resets the retry counter; call on a successful `Connected` event.
	pub fn reset(&mut self) {
		self.retries = 0;
	}

	/// Records a failure and returns whether/how long to wait before
	/// retrying, per `base * 2^(retry-1)` ms, base 1000ms, capped at 5
	/// attempts.
	pub fn on_disconnected(&mut self) -> ReconnectDecision {
		self.retries += 1;
		if self.retries > MAX_RETRIES {
			return ReconnectDecision::GiveUp;
		}
		let backoff_ms = BASE_BACKOFF_MS * (1u64 << (self.retries - 1));
		ReconnectDecision::RetryAfter(Duration::from_millis(backoff_ms))
	}
}
