//! The relay actor, generalizing `xeno-broker`'s routing actor's
//! registration/lookup-by-key pattern to a `(session, participant, role)`
//! index.

use std::collections::HashMap;

use tandem_core::{Error, SessionId, UserId};
use tokio::sync::mpsc;

use crate::envelope::{Envelope, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ParticipantKey {
	session: SessionId,
	participant: UserId,
	role: Role,
}

#[derive(Debug)]
pub enum RelayCmd {
	Register {
		session: SessionId,
		participant: UserId,
		role: Role,
		sink: mpsc::Sender<Envelope>,
	},
	Unregister {
		session: SessionId,
		participant: UserId,
		role: Role,
	},
	Send {
		envelope: Envelope,
		reply: tokio::sync::oneshot::Sender<Result<(), Error>>,
	},
}

#[derive(Clone, Debug)]
pub struct RelayHandle {
	tx: mpsc::Sender<RelayCmd>,
}

impl RelayHandle {
	pub fn new(tx: mpsc::Sender<RelayCmd>) -> Self {
		Self { tx }
	}

	pub async fn register(&self, session: SessionId, participant: UserId, role: Role, sink: mpsc::Sender<Envelope>) {
		let _ = self
			.tx
			.send(RelayCmd::Register {
				session,
				participant,
				role,
				sink,
			})
			.await;
	}

	pub async fn unregister(&self, session: SessionId, participant: UserId, role: Role) {
		let _ = self.tx.send(RelayCmd::Unregister { session, participant, role }).await;
	}

	/// Validates and forwards an envelope to its registered recipient.
	pub async fn send(&self, envelope: Envelope) -> Result<(), Error> {
		envelope.validate()?;
		let (reply, rx) = tokio::sync::oneshot::channel();
		self.tx.send(RelayCmd::Send { envelope, reply }).await.map_err(|_| Error::cancelled())?;
		rx.await.map_err(|_| Error::cancelled())?
	}
}

/// Owns every registered connection sink; removed from the critical path
/// once a peer channel opens (spec §4.H), so this actor's lifetime is
/// intentionally short per session.
pub struct RelayService {
	rx: mpsc::Receiver<RelayCmd>,
	sinks: HashMap<ParticipantKey, mpsc::Sender<Envelope>>,
}

impl RelayService {
	pub fn start() -> RelayHandle {
		let (tx, rx) = mpsc::channel(256);
		let service = Self { rx, sinks: HashMap::new() };
		tokio::spawn(service.run());
		RelayHandle::new(tx)
	}

	async fn run(mut self) {
		while let Some(cmd) = self.rx.recv().await {
			match cmd {
				RelayCmd::Register {
					session,
					participant,
					role,
					sink,
				} => {
					self.sinks.insert(ParticipantKey { session, participant, role }, sink);
				}
				RelayCmd::Unregister { session, participant, role } => {
					self.sinks.remove(&ParticipantKey { session, participant, role });
				}
				RelayCmd::Send { envelope, reply } => {
					let key = ParticipantKey {
						session: envelope.session,
						participant: envelope.to,
						role: envelope.to_role,
					};
					let result = match self.sinks.get(&key) {
						Some(sink) => sink.send(envelope).await.map_err(|_| Error::not_found("recipient disconnected")),
						None => Err(Error::not_found("recipient not registered")),
					};
					let _ = reply.send(result);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::envelope::EnvelopeKind;
	use serde_json::json;
	use tandem_core::{SessionId, UserId};

	#[tokio::test]
	async fn forwards_envelope_to_registered_recipient() {
		let handle = RelayService::start();
		let session = SessionId::new();
		let host = UserId::new();
		let guest = UserId::new();
		let (sink, mut rx) = mpsc::channel(4);
		handle.register(session, guest, Role::Guest, sink).await;

		handle
			.send(Envelope {
				kind: EnvelopeKind::SdpOffer,
				session,
				from: host,
				from_role: Role::Host,
				to: guest,
				to_role: Role::Guest,
				payload: json!({"sdp": "v=0..."}),
			})
			.await
			.unwrap();

		let received = rx.recv().await.unwrap();
		assert_eq!(received.from, host);
	}

	#[tokio::test]
	async fn send_to_unregistered_recipient_errors() {
		let handle = RelayService::start();
		let result = handle
			.send(Envelope {
				kind: EnvelopeKind::GuestApproved,
				session: SessionId::new(),
				from: UserId::new(),
				from_role: Role::Host,
				to: UserId::new(),
				to_role: Role::Guest,
				payload: json!({}),
			})
			.await;
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn invalid_envelope_never_reaches_the_actor() {
		let handle = RelayService::start();
		let result = handle
			.send(Envelope {
				kind: EnvelopeKind::SdpOffer,
				session: SessionId::new(),
				from: UserId::new(),
				from_role: Role::Host,
				to: UserId::new(),
				to_role: Role::Guest,
				payload: json!({}),
			})
			.await;
		assert_eq!(result.unwrap_err().kind, tandem_core::ErrorKind::Validation);
	}
}
