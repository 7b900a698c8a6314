//! The transport boundary a [`crate::connection::PeerConnection`] is
//! driven through.
//!
//! The actual ICE/SCTP/WebRTC data channel is an external collaborator
//! (spec §1); this trait isolates the state machine from it the way
//! `tower_service::Service` isolates request handling from the concrete
//! connection underneath it.

use async_trait::async_trait;
use tandem_core::Error;

use crate::lane::Lane;

/// Something the transport reports without being asked.
#[derive(Debug, Clone)]
pub enum TransportEvent {
	Connected,
	Disconnected,
	Frame { lane: Lane, bytes: Vec<u8> },
}

#[async_trait]
pub trait PeerTransport: Send + Sync {
	/// Initiates (or re-initiates) the underlying connection.
	async fn connect(&self) -> Result<(), Error>;

	/// Sends raw, already-framed bytes on a lane.
	async fn send(&self, lane: Lane, bytes: Vec<u8>) -> Result<(), Error>;

	/// Awaits the next transport-level event.
	async fn next_event(&self) -> Result<TransportEvent, Error>;

	/// Tears the connection down; idempotent.
	async fn close(&self);
}
