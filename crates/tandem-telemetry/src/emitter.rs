//! The telemetry sink boundary.

use crate::event::{ActionEvent, CacheEvent, RequestEvent};

/// Receives telemetry events from the upstream client, cache, and poller.
///
/// Object-safe so a host application can plug in whatever sink it prefers
/// (a log line, an in-memory test collector, or a real metrics backend);
/// the sink itself is an external collaborator, not this crate's concern.
pub trait TelemetryEmitter: Send + Sync {
	fn emit_request(&self, event: RequestEvent);
	fn emit_cache(&self, event: CacheEvent);
	fn emit_action(&self, event: ActionEvent);
}

/// The default emitter: logs each event family at an appropriate level via
/// `tracing`, matching this workspace's existing instrumentation style.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

impl TelemetryEmitter for TracingEmitter {
	fn emit_request(&self, event: RequestEvent) {
		tracing::debug!(
			method = event.method,
			endpoint = %event.endpoint,
			status = event.status,
			duration_ms = event.duration.as_millis() as u64,
			cache = ?event.cache,
			rate_remaining = ?event.rate_remaining,
			"upstream request",
		);
	}

	fn emit_cache(&self, event: CacheEvent) {
		tracing::trace!(
			method = event.method,
			endpoint = %event.endpoint,
			cache = ?event.cache,
			"cache lookup",
		);
	}

	fn emit_action(&self, event: ActionEvent) {
		if event.success {
			tracing::info!(
				action = event.action.as_str(),
				method = event.method,
				endpoint = %event.endpoint,
				status = event.status,
				duration_ms = event.duration.as_millis() as u64,
				"action succeeded",
			);
		} else {
			tracing::warn!(
				action = event.action.as_str(),
				method = event.method,
				endpoint = %event.endpoint,
				status = event.status,
				duration_ms = event.duration.as_millis() as u64,
				error_kind = ?event.error_kind,
				"action failed",
			);
		}
	}
}

/// Drops every event. Useful when a caller has wired no sink at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl TelemetryEmitter for NoopEmitter {
	fn emit_request(&self, _event: RequestEvent) {}
	fn emit_cache(&self, _event: CacheEvent) {}
	fn emit_action(&self, _event: ActionEvent) {}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;
	use crate::event::CacheOutcome;

	#[derive(Default)]
	struct Collector {
		requests: Mutex<Vec<RequestEvent>>,
	}

	impl TelemetryEmitter for Collector {
		fn emit_request(&self, event: RequestEvent) {
			self.requests.lock().unwrap().push(event);
		}
		fn emit_cache(&self, _event: CacheEvent) {}
		fn emit_action(&self, _event: ActionEvent) {}
	}

	#[test]
	fn collector_records_request_events() {
		let collector = Collector::default();
		collector.emit_request(RequestEvent {
			method: "GET",
			endpoint: "/repos/acme/orch/pulls".into(),
			status: 200,
			duration: std::time::Duration::from_millis(12),
			cache: CacheOutcome::Miss,
			rate_remaining: Some(4999),
		});
		assert_eq!(collector.requests.lock().unwrap().len(), 1);
	}
}
