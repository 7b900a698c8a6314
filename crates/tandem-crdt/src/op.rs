//! The wire representation of a local mutation: an opaque, ordered list of
//! insert/delete operations (spec §4.E "local mutation emits an update
//! blob").

use serde::{Deserialize, Serialize};

/// Uniquely identifies one inserted character across all sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId {
	pub site: u64,
	pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
	/// Inserts `value` immediately after `left` (or at the head when
	/// `left` is `None`).
	Insert { id: ElementId, left: Option<ElementId>, value: char },
	/// Tombstones a previously inserted element. If `id` hasn't arrived yet
	/// (out-of-order delivery), the register buffers the delete as a
	/// pending tombstone and applies it the moment the matching insert
	/// lands, so arrival order never changes the converged result.
	Delete { id: ElementId },
}

/// A batch of operations produced by one local mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBlob {
	pub ops: Vec<Op>,
}

impl UpdateBlob {
	/// Encodes the blob as postcard bytes, base64-armored for the wire
	/// (the `yjs_update` payload type per spec §6 — the name is the wire
	/// contract's, not a claim about the encoding underneath it).
	pub fn encode(&self) -> String {
		let bytes = postcard::to_allocvec(self).expect("UpdateBlob always serializes");
		base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
	}

	pub fn decode(armored: &str) -> Result<Self, tandem_core::Error> {
		let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, armored)
			.map_err(|e| tandem_core::Error::validation(format!("malformed update blob: {e}")))?;
		postcard::from_bytes(&bytes).map_err(|e| tandem_core::Error::validation(format!("malformed update blob: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_armor() {
		let blob = UpdateBlob {
			ops: vec![
				Op::Insert {
					id: ElementId { site: 1, counter: 1 },
					left: None,
					value: 'h',
				},
				Op::Delete { id: ElementId { site: 1, counter: 1 } },
			],
		};
		let armored = blob.encode();
		let decoded = UpdateBlob::decode(&armored).unwrap();
		assert_eq!(decoded.ops, blob.ops);
	}

	#[test]
	fn decode_rejects_garbage() {
		assert!(UpdateBlob::decode("not valid base64!!!").is_err());
	}
}
