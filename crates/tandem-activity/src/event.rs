//! The activity event and its list-query options (spec §3 "Activity
//! Event", §4.I).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_cache::Scope;
use tandem_core::ActivityId;

/// A deduplicated notification of an externally observed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
	pub id: ActivityId,
	pub kind: String,
	pub scope: Scope,
	pub subject_path: String,
	pub branch: Option<String>,
	pub message: String,
	pub details: serde_json::Value,
	pub dedup_key: String,
	pub timestamp: DateTime<Utc>,
}

/// The fields a caller supplies; `id` and `timestamp` are assigned on
/// acceptance into the buffer.
#[derive(Debug, Clone)]
pub struct NewActivityEvent {
	pub kind: String,
	pub scope: Scope,
	pub subject_path: String,
	pub branch: Option<String>,
	pub message: String,
	pub details: serde_json::Value,
	pub dedup_key: String,
}

/// Filters and bounds for [`list`](crate::buffer::ActivityBuffer::list).
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
	pub kind: Option<String>,
	pub scope: Option<Scope>,
	pub limit: Option<usize>,
}
