//! The five data-channel lanes and their per-lane payload shapes (spec §6).

use serde::{Deserialize, Serialize};

/// One of the five typed sub-channels multiplexed over a single peer
/// transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
	/// Ordered; carries the shared-input register's snapshots and updates.
	TerminalIo,
	/// Unordered-but-reliable; host-only hydrated state broadcast.
	RemoteServiceState,
	/// Unordered-but-reliable; ephemeral position/typing beacons.
	CursorAwareness,
	/// Unordered-but-reliable; scroll-sync, permission, resize, kick.
	Control,
	/// Unordered-but-reliable; plain text.
	Chat,
}

impl Lane {
	/// Ordering guarantee this lane requires of the transport (spec §6 /
	/// §4.F "terminal-io ordered, others unordered-but-reliable").
	pub fn ordered(self) -> bool {
		matches!(self, Lane::TerminalIo)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TerminalIoPayload {
	Snapshot { text: String },
	Update { blob: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteServiceStatePayload {
	/// Opaque hydrated JSON body; this lane's content is a property of the
	/// remote-service schema, not of the transport.
	pub json: String,
}

/// Strictly validated: every field is required, so a frame missing any of
/// them fails to decode and is discarded per spec ("reject on any missing
/// field").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorBeacon {
	pub user: tandem_core::UserId,
	pub name: String,
	pub color: String,
	pub line: u32,
	pub column: u32,
	pub typing: bool,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlEvent {
	ScrollSync { line: u32 },
	PermissionChange { role: String },
	Resize { cols: u16, rows: u16 },
	Kick,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
	pub text: String,
}
