//! The broker actor: `BrokerCmd` / `BrokerHandle` / `BrokerService`,
//! generalizing `xeno-broker`'s `services::sessions` pattern from "editor
//! session sinks" to "session + guest" lifecycle.

use std::time::Duration;

use chrono::Utc;
use tandem_core::{Error, SessionId, UserId};
use tokio::sync::{mpsc, oneshot};

use crate::shortcode;
use crate::types::{Guest, GuestState, Session, SessionState};

#[derive(Debug)]
pub enum BrokerCmd {
	CreateSession {
		host: UserId,
		reply: oneshot::Sender<(SessionId, String)>,
	},
	JoinSession {
		short_code: String,
		user: UserId,
		reply: oneshot::Sender<Result<SessionId, Error>>,
	},
	ApproveGuest {
		session: SessionId,
		user: UserId,
		reply: oneshot::Sender<Result<(), Error>>,
	},
	RejectGuest {
		session: SessionId,
		user: UserId,
		reply: oneshot::Sender<Result<(), Error>>,
	},
	/// Reported once the approved guest's peer channel reaches `connected`
	/// — transitions `waiting` to `active` (spec §3).
	GuestConnected {
		session: SessionId,
		user: UserId,
		reply: oneshot::Sender<Result<(), Error>>,
	},
	EndSession {
		session: SessionId,
		reply: oneshot::Sender<Result<(), Error>>,
	},
	ListPending {
		session: SessionId,
		reply: oneshot::Sender<Result<Vec<UserId>, Error>>,
	},
}

#[derive(Clone, Debug)]
pub struct BrokerHandle {
	tx: mpsc::Sender<BrokerCmd>,
}

impl BrokerHandle {
	pub fn new(tx: mpsc::Sender<BrokerCmd>) -> Self {
		Self { tx }
	}

	pub async fn create_session(&self, host: UserId) -> Option<(SessionId, String)> {
		let (reply, rx) = oneshot::channel();
		self.tx.send(BrokerCmd::CreateSession { host, reply }).await.ok()?;
		rx.await.ok()
	}

	pub async fn join_session(&self, short_code: impl Into<String>, user: UserId) -> Result<SessionId, Error> {
		let (reply, rx) = oneshot::channel();
		let short_code = short_code.into();
		self.tx
			.send(BrokerCmd::JoinSession { short_code, user, reply })
			.await
			.map_err(|_| Error::cancelled())?;
		rx.await.map_err(|_| Error::cancelled())?
	}

	pub async fn approve_guest(&self, session: SessionId, user: UserId) -> Result<(), Error> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BrokerCmd::ApproveGuest { session, user, reply })
			.await
			.map_err(|_| Error::cancelled())?;
		rx.await.map_err(|_| Error::cancelled())?
	}

	pub async fn reject_guest(&self, session: SessionId, user: UserId) -> Result<(), Error> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BrokerCmd::RejectGuest { session, user, reply })
			.await
			.map_err(|_| Error::cancelled())?;
		rx.await.map_err(|_| Error::cancelled())?
	}

	pub async fn guest_connected(&self, session: SessionId, user: UserId) -> Result<(), Error> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BrokerCmd::GuestConnected { session, user, reply })
			.await
			.map_err(|_| Error::cancelled())?;
		rx.await.map_err(|_| Error::cancelled())?
	}

	pub async fn end_session(&self, session: SessionId) -> Result<(), Error> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BrokerCmd::EndSession { session, reply })
			.await
			.map_err(|_| Error::cancelled())?;
		rx.await.map_err(|_| Error::cancelled())?
	}

	pub async fn list_pending(&self, session: SessionId) -> Result<Vec<UserId>, Error> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BrokerCmd::ListPending { session, reply })
			.await
			.map_err(|_| Error::cancelled())?;
		rx.await.map_err(|_| Error::cancelled())?
	}
}

/// Owns every running session; one broker actor per host process, mirroring
/// `SessionService`'s single `HashMap` of live state.
pub struct BrokerService {
	rx: mpsc::Receiver<BrokerCmd>,
	sessions: Vec<Session>,
	guest_pending_timeout: Duration,
	ended_grace_period: Duration,
	prune_interval: Duration,
}

impl BrokerService {
	pub fn start(guest_pending_timeout: Duration, ended_grace_period: Duration) -> BrokerHandle {
		let (tx, rx) = mpsc::channel(256);
		let service = Self {
			rx,
			sessions: Vec::new(),
			guest_pending_timeout,
			ended_grace_period,
			prune_interval: guest_pending_timeout.min(ended_grace_period).max(Duration::from_secs(1)),
		};
		tokio::spawn(service.run());
		BrokerHandle::new(tx)
	}

	fn find_mut(&mut self, id: SessionId) -> Option<&mut Session> {
		self.sessions.iter_mut().find(|s| s.id == id)
	}

	async fn run(mut self) {
		let mut prune = tokio::time::interval(self.prune_interval);
		loop {
			tokio::select! {
				cmd = self.rx.recv() => {
					match cmd {
						Some(cmd) => self.handle(cmd),
						None => return,
					}
				}
				_ = prune.tick() => self.prune_expired_sessions(),
			}
		}
	}

	fn prune_expired_sessions(&mut self) {
		let now = Utc::now();
		let timeout = self.guest_pending_timeout;
		for session in &mut self.sessions {
			for guest in &mut session.guests {
				if guest.state == GuestState::Pending {
					let age = now - guest.requested_at;
					if age.to_std().unwrap_or(Duration::ZERO) > timeout {
						guest.state = GuestState::Expired;
					}
				}
			}
		}
		self.sweep_ended_sessions(now);
	}

	/// Removes `Ended` sessions once their grace period has elapsed
	/// (spec line 79), freeing their short codes for reuse.
	fn sweep_ended_sessions(&mut self, now: chrono::DateTime<Utc>) {
		let grace = self.ended_grace_period;
		self.sessions.retain(|s| match s.ended_at {
			Some(ended_at) => (now - ended_at).to_std().unwrap_or(Duration::ZERO) <= grace,
			None => true,
		});
	}

	fn handle(&mut self, cmd: BrokerCmd) {
		match cmd {
			BrokerCmd::CreateSession { host, reply } => {
				let existing: Vec<String> = self.sessions.iter().map(|s| s.short_code.clone()).collect();
				let code = shortcode::generate_unique(|candidate| existing.iter().any(|c| c == candidate));
				let session = Session::new(host, code.clone(), Utc::now());
				let id = session.id;
				self.sessions.push(session);
				tracing::info!(session = ?id, code = %code, "session created");
				let _ = reply.send((id, code));
			}
			BrokerCmd::JoinSession { short_code, user, reply } => {
				let short_code = short_code.to_ascii_uppercase();
				let result = match self.sessions.iter_mut().find(|s| s.short_code == short_code) {
					Some(session) if session.state == SessionState::Ended => Err(Error::not_found("session has ended")),
					Some(session) if session.state == SessionState::Active => {
						Err(Error::not_found("code already invalidated by a connected peer"))
					}
					Some(session) => {
						session.guests.push(Guest {
							user,
							state: GuestState::Pending,
							requested_at: Utc::now(),
						});
						Ok(session.id)
					}
					None => Err(Error::not_found("no session with that code")),
				};
				let _ = reply.send(result);
			}
			BrokerCmd::ApproveGuest { session, user, reply } => {
				let result = self.transition_guest(session, user, GuestState::Approved);
				let _ = reply.send(result);
			}
			BrokerCmd::RejectGuest { session, user, reply } => {
				let result = self.transition_guest(session, user, GuestState::Rejected);
				let _ = reply.send(result);
			}
			BrokerCmd::GuestConnected { session, user, reply } => {
				let result = match self.find_mut(session) {
					Some(s) => {
						let approved = s.guests.iter().any(|g| g.user == user && g.state == GuestState::Approved);
						if approved && s.state == SessionState::Waiting {
							s.state = SessionState::Active;
							tracing::info!(session = ?session, "session became active");
						}
						Ok(())
					}
					None => Err(Error::not_found("unknown session")),
				};
				let _ = reply.send(result);
			}
			BrokerCmd::EndSession { session, reply } => {
				let result = match self.find_mut(session) {
					Some(s) => {
						s.state = SessionState::Ended;
						s.ended_at = Some(Utc::now());
						tracing::info!(session = ?session, "session ended");
						Ok(())
					}
					None => Err(Error::not_found("unknown session")),
				};
				let _ = reply.send(result);
			}
			BrokerCmd::ListPending { session, reply } => {
				let result = match self.sessions.iter().find(|s| s.id == session) {
					Some(s) => Ok(s.pending_guests().map(|g| g.user).collect()),
					None => Err(Error::not_found("unknown session")),
				};
				let _ = reply.send(result);
			}
		}
	}

	fn transition_guest(&mut self, session: SessionId, user: UserId, state: GuestState) -> Result<(), Error> {
		let session = self.find_mut(session).ok_or_else(|| Error::not_found("unknown session"))?;
		let guest = session.guest_mut(user).ok_or_else(|| Error::not_found("unknown guest"))?;
		guest.state = state;
		Ok(())
	}
}
