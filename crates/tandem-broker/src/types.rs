//! Session and guest lifecycle state (spec §4.G, §3).

use chrono::{DateTime, Utc};
use tandem_core::{SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Waiting,
	Active,
	Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestState {
	Pending,
	Approved,
	Rejected,
	Expired,
}

#[derive(Debug, Clone)]
pub struct Guest {
	pub user: UserId,
	pub state: GuestState,
	pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
	pub id: SessionId,
	pub short_code: String,
	pub host: UserId,
	pub state: SessionState,
	pub guests: Vec<Guest>,
	pub created_at: DateTime<Utc>,
	/// Set the moment `state` becomes `Ended`; drives the grace-period sweep.
	pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
	pub fn new(host: UserId, short_code: String, now: DateTime<Utc>) -> Self {
		Self {
			id: SessionId::new(),
			short_code,
			host,
			state: SessionState::Waiting,
			guests: Vec::new(),
			created_at: now,
			ended_at: None,
		}
	}

	pub fn guest_mut(&mut self, user: UserId) -> Option<&mut Guest> {
		self.guests.iter_mut().find(|g| g.user == user)
	}

	pub fn pending_guests(&self) -> impl Iterator<Item = &Guest> {
		self.guests.iter().filter(|g| g.state == GuestState::Pending)
	}
}
