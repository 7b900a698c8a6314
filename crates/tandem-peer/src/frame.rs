//! Wire framing shared by every lane.

use serde::{Deserialize, Serialize};
use tandem_core::UserId;

use crate::lane::Lane;

/// `{lane, type, payload, from_user, timestamp_ms}` (spec §6), postcard
/// encoded for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
	pub lane: Lane,
	pub frame_type: String,
	pub payload: Vec<u8>,
	pub from_user: UserId,
	pub timestamp_ms: i64,
}

impl Frame {
	pub fn encode(&self) -> Result<Vec<u8>, tandem_core::Error> {
		postcard::to_allocvec(self).map_err(|e| tandem_core::Error::validation(format!("frame encode failed: {e}")))
	}

	/// Decodes a frame; a malformed byte stream is reported as a
	/// [`tandem_core::ErrorKind::Validation`] error so callers can log at
	/// warn and discard, per spec ("a malformed frame logs at warn level
	/// and is discarded").
	pub fn decode(bytes: &[u8]) -> Result<Self, tandem_core::Error> {
		postcard::from_bytes(bytes).map_err(|e| tandem_core::Error::validation(format!("malformed frame: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_wire_encoding() {
		let frame = Frame {
			lane: Lane::Chat,
			frame_type: "message".into(),
			payload: vec![1, 2, 3],
			from_user: UserId::new(),
			timestamp_ms: 1234,
		};
		let bytes = frame.encode().unwrap();
		let decoded = Frame::decode(&bytes).unwrap();
		assert_eq!(decoded.frame_type, "message");
		assert_eq!(decoded.payload, vec![1, 2, 3]);
	}

	#[test]
	fn decode_rejects_truncated_bytes() {
		assert!(Frame::decode(&[0xff, 0x02]).is_err());
	}
}
