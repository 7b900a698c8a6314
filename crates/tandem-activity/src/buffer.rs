//! The ring buffer and dedup map themselves, kept as a plain struct so
//! timing can be driven explicitly in tests (mirrors `tandem_cache`'s
//! `EntityCache` taking `Instant` parameters rather than reading a clock
//! internally).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use tandem_core::ActivityId;

use crate::event::{ActivityEvent, ListOptions, NewActivityEvent};

pub struct ActivityBuffer {
	capacity: usize,
	dedup_window: Duration,
	events: VecDeque<ActivityEvent>,
	dedup: HashMap<String, Instant>,
	next_id: u64,
}

impl ActivityBuffer {
	pub fn new(capacity: usize, dedup_window: Duration) -> Self {
		Self {
			capacity,
			dedup_window,
			events: VecDeque::with_capacity(capacity),
			dedup: HashMap::new(),
			next_id: 0,
		}
	}

	/// Accepts or collapses `event` depending on whether its dedup key was
	/// seen within the dedup window. Returns the canonical (already-seen or
	/// newly-assigned) event alongside whether it was newly accepted.
	pub fn append(&mut self, event: NewActivityEvent, now: Instant) -> (ActivityEvent, bool) {
		if let Some(&seen_at) = self.dedup.get(&event.dedup_key) {
			if now.saturating_duration_since(seen_at) <= self.dedup_window {
				let existing = self
					.events
					.iter()
					.rfind(|e| e.dedup_key == event.dedup_key)
					.cloned()
					.expect("dedup map and buffer are kept in sync");
				return (existing, false);
			}
		}

		self.dedup.insert(event.dedup_key.clone(), now);
		let id = ActivityId(self.next_id);
		self.next_id += 1;
		let canonical = ActivityEvent {
			id,
			kind: event.kind,
			scope: event.scope,
			subject_path: event.subject_path,
			branch: event.branch,
			message: event.message,
			details: event.details,
			dedup_key: event.dedup_key,
			timestamp: Utc::now(),
		};

		if self.events.len() == self.capacity {
			self.events.pop_front();
		}
		self.events.push_back(canonical.clone());
		(canonical, true)
	}

	/// A reverse-time slice filtered by type and/or scope, bounded by
	/// `opts.limit` (default 50, ceiling 500 — spec §4.I).
	pub fn list(&self, opts: &ListOptions) -> Vec<ActivityEvent> {
		const DEFAULT_LIMIT: usize = 50;
		const MAX_LIMIT: usize = 500;
		let limit = opts.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

		self.events
			.iter()
			.rev()
			.filter(|e| opts.kind.as_deref().is_none_or(|k| e.kind == k))
			.filter(|e| opts.scope.as_ref().is_none_or(|s| &e.scope == s))
			.take(limit)
			.cloned()
			.collect()
	}

	/// Drops dedup entries older than the window, keeping the map from
	/// growing unbounded across the process lifetime (spec §4.I).
	pub fn prune_dedup(&mut self, now: Instant) {
		self.dedup.retain(|_, &mut seen_at| now.saturating_duration_since(seen_at) <= self.dedup_window);
	}
}
