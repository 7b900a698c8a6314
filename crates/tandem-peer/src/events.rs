//! Events a [`crate::connection::PeerConnection`] surfaces to subscribers.

use tandem_core::UserId;

use crate::lane::{ChatMessage, ControlEvent, CursorBeacon};

#[derive(Debug, Clone)]
pub enum PeerEvent {
	Connected,
	/// The terminal shared-input register changed, already applied.
	TerminalUpdated { snapshot: String },
	Cursor { from: UserId, beacon: CursorBeacon },
	Control { from: UserId, event: ControlEvent },
	Chat { from: UserId, message: ChatMessage },
	RemoteServiceState { json: String },
	/// Emitted exactly once, on the 6th consecutive reconnect failure.
	Failed,
	Closed,
}
