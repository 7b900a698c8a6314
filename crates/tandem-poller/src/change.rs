//! Change classification emitted by one poll tick.

use chrono::{DateTime, Utc};

/// Whether a changed resource is newly appeared or merely updated, relative
/// to the high-water mark carried into this tick (spec §4.D step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	New,
	Updated,
}

/// A single resource observed to have changed during a poll tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
	pub resource: &'static str,
	pub number: u64,
	pub updated_at: DateTime<Utc>,
	pub kind: ChangeKind,
}

/// A resource is `New` when its update time falls within 2 seconds of the
/// high-water mark carried into the tick that observed it, else `Updated`.
pub fn classify(updated_at: DateTime<Utc>, prior_high_water_mark: DateTime<Utc>) -> ChangeKind {
	let delta = updated_at - prior_high_water_mark;
	if delta <= chrono::Duration::seconds(2) {
		ChangeKind::New
	} else {
		ChangeKind::Updated
	}
}
