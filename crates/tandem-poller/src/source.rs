//! The delta-query boundary the poller drives.
//!
//! The exact GraphQL/REST shape of a "minimal delta query" is a property
//! of the upstream schema, not of the polling algorithm; this crate only
//! needs a sorted, paged list of `(resource, number, updated_at)` tuples; the
//! concrete query lives behind this trait the way `tandem-peer`'s
//! `PeerTransport` isolates transport specifics from its state machine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tandem_core::Error;

/// A repository this poller instance tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollTarget {
	pub owner: String,
	pub repo: String,
}

impl PollTarget {
	pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			repo: repo.into(),
		}
	}
}

/// One row of a delta query result.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaItem {
	pub resource: &'static str,
	pub number: u64,
	pub updated_at: DateTime<Utc>,
}

/// Supplies the minimal, update-time-descending delta query a poll tick
/// issues (spec §4.D step 2).
#[async_trait]
pub trait DeltaSource: Send + Sync {
	async fn query_delta(&self, target: &PollTarget, page_size: u32) -> Result<Vec<DeltaItem>, Error>;
}
