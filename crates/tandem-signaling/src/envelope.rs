//! Opaque envelope types carried by the relay (spec §4.H).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_core::{Error, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
	Host,
	Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeKind {
	SdpOffer,
	SdpAnswer,
	IceCandidate,
	GuestApproved,
	GuestRejected,
	SessionEnded,
	PermissionChange,
}

impl EnvelopeKind {
	/// The JSON object keys an envelope of this kind must carry; the relay
	/// validates presence only, never interpreting the values (spec §4.H
	/// "no inspection of the payload beyond envelope validation").
	fn required_fields(self) -> &'static [&'static str] {
		match self {
			EnvelopeKind::SdpOffer | EnvelopeKind::SdpAnswer => &["sdp"],
			EnvelopeKind::IceCandidate => &["candidate"],
			EnvelopeKind::GuestApproved | EnvelopeKind::GuestRejected | EnvelopeKind::SessionEnded => &[],
			EnvelopeKind::PermissionChange => &["role"],
		}
	}
}

/// A routed message between two participants of the same session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
	pub kind: EnvelopeKind,
	pub session: SessionId,
	pub from: UserId,
	pub from_role: Role,
	pub to: UserId,
	pub to_role: Role,
	pub payload: Value,
}

impl Envelope {
	/// Checks the payload carries every field its kind requires; this is
	/// the full extent of the relay's validation.
	pub fn validate(&self) -> Result<(), Error> {
		let object = self.payload.as_object().ok_or_else(|| Error::validation("envelope payload must be a JSON object"))?;
		for field in self.kind.required_fields() {
			if !object.contains_key(*field) {
				return Err(Error::validation(format!("envelope of kind {:?} missing required field `{field}`", self.kind)));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn envelope(kind: EnvelopeKind, payload: Value) -> Envelope {
		Envelope {
			kind,
			session: SessionId::new(),
			from: UserId::new(),
			from_role: Role::Host,
			to: UserId::new(),
			to_role: Role::Guest,
			payload,
		}
	}

	#[test]
	fn sdp_offer_requires_sdp_field() {
		assert!(envelope(EnvelopeKind::SdpOffer, json!({})).validate().is_err());
		assert!(envelope(EnvelopeKind::SdpOffer, json!({"sdp": "v=0..."})).validate().is_ok());
	}

	#[test]
	fn guest_approved_has_no_required_fields() {
		assert!(envelope(EnvelopeKind::GuestApproved, json!({})).validate().is_ok());
	}

	#[test]
	fn non_object_payload_is_rejected() {
		assert!(envelope(EnvelopeKind::GuestApproved, json!("not an object")).validate().is_err());
	}

	#[test]
	fn permission_change_requires_role_field() {
		assert!(envelope(EnvelopeKind::PermissionChange, json!({"scope": "write"})).validate().is_err());
		assert!(envelope(EnvelopeKind::PermissionChange, json!({"role": "read-only"})).validate().is_ok());
	}
}
