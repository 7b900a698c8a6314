//! The closed error taxonomy shared by every tandem component.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The closed set of error categories a caller can branch on (spec's
/// nine-kind taxonomy). Internal-only conditions such as a caller's
/// cancellation signal firing are folded into [`ErrorKind::Unknown`]
/// rather than extending this set — `Error::cancelled` constructs exactly
/// that, distinguishable by its message for logging, not by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Missing or expired credentials (HTTP 401, or no token supplied).
	Auth,
	/// Scope or ACL rejection (HTTP 403, not a rate-limit signal).
	Permission,
	/// HTTP 403 with a rate-limit hint, 429, or a locally depleted quota.
	RateLimit,
	/// HTTP 404.
	NotFound,
	/// HTTP 409, or a detected merge conflict.
	Conflict,
	/// HTTP 422, or a local pre-flight validation failure.
	Validation,
	/// Transport-level failure (status 0).
	Network,
	/// The graph endpoint returned an `errors` array despite HTTP 200.
	GraphQl,
	/// Any other unmapped condition, including a fired cancellation signal.
	Unknown,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::Auth => "auth",
			ErrorKind::Permission => "permission",
			ErrorKind::RateLimit => "ratelimit",
			ErrorKind::NotFound => "notfound",
			ErrorKind::Conflict => "conflict",
			ErrorKind::Validation => "validation",
			ErrorKind::Network => "network",
			ErrorKind::GraphQl => "graphql",
			ErrorKind::Unknown => "unknown",
		};
		f.write_str(s)
	}
}

/// A uniform error carrying an HTTP-shaped status, a human message, and a
/// taxonomy kind.
///
/// `status` is `0` for transport-level failures that never reached the
/// upstream service (spec's "network" trigger). `retry_after` carries the
/// upstream's advertised Retry-After delay when the response was a rate
/// limit, so a retry loop doesn't have to re-parse the response headers.
#[derive(Debug, Error, Clone)]
#[error("{kind} (status {status}): {message}")]
pub struct Error {
	pub status: u16,
	pub message: String,
	pub kind: ErrorKind,
	pub retry_after: Option<Duration>,
}

impl Error {
	pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
		Self {
			status,
			message: message.into(),
			kind,
			retry_after: None,
		}
	}

	pub fn validation(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Validation, 422, message)
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::NotFound, 404, message)
	}

	pub fn cancelled() -> Self {
		Self::new(ErrorKind::Unknown, 0, "operation cancelled")
	}

	pub fn network(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Network, 0, message)
	}

	/// Attaches a Retry-After delay, e.g. parsed from a 429/403 response
	/// header via `tandem_ratelimit::parse_retry_after`.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;
		self
	}

	/// Maps an HTTP status code to a taxonomy kind per the closed mapping in
	/// the spec. `secondary_rate_limit` should be `true` when response
	/// headers or body indicate a secondary rate limit on a 403.
	pub fn from_status(status: u16, secondary_rate_limit: bool, message: impl Into<String>) -> Self {
		let kind = match status {
			401 => ErrorKind::Auth,
			403 if secondary_rate_limit => ErrorKind::RateLimit,
			403 => ErrorKind::Permission,
			404 => ErrorKind::NotFound,
			409 => ErrorKind::Conflict,
			422 => ErrorKind::Validation,
			429 => ErrorKind::RateLimit,
			_ => ErrorKind::Unknown,
		};
		Self::new(kind, status, message)
	}
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_secondary_rate_limit_403_to_ratelimit() {
		let err = Error::from_status(403, true, "abuse detection");
		assert_eq!(err.kind, ErrorKind::RateLimit);
	}

	#[test]
	fn maps_plain_403_to_permission() {
		let err = Error::from_status(403, false, "forbidden");
		assert_eq!(err.kind, ErrorKind::Permission);
	}

	#[test]
	fn unmapped_status_is_unknown() {
		let err = Error::from_status(418, false, "teapot");
		assert_eq!(err.kind, ErrorKind::Unknown);
	}
}
