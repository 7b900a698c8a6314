//! Request/response model shared by the graph and REST surfaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bearer credential used for a single caller's requests.
///
/// The host-driven fan-out invariant means the host's credential drives
/// reads and hydrated broadcast, while each guest supplies its own
/// credential for its own mutating calls — this type draws no distinction
/// between the two, that's a caller-side concern.
#[derive(Clone)]
pub struct Credential {
	pub token: String,
}

impl std::fmt::Debug for Credential {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credential").field("token", &"<redacted>").finish()
	}
}

/// Which `Accept` header a REST request should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
	Json,
	Diff,
}

impl Accept {
	pub fn header_value(self) -> &'static str {
		match self {
			Accept::Json => "application/vnd.github+json",
			Accept::Diff => "application/vnd.github.diff",
		}
	}
}

/// The outcome of a conditionally-revalidated request.
#[derive(Debug, Clone)]
pub enum Revalidated<T> {
	/// The upstream returned a fresh body.
	Modified { body: T, etag: Option<String> },
	/// The upstream returned 304; the caller should recycle its cached
	/// value and touch its timestamp (spec §4.C, §8 invariant 3).
	NotModified,
}

/// A single file entry within a pull request diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
	pub path: String,
	pub added: u32,
	pub removed: u32,
	pub status: String,
	pub patch: Option<String>,
	/// True when the decoded patch exceeded the 128 KiB cap and was
	/// truncated at a line boundary (spec §8 boundary behavior).
	pub truncated: bool,
	/// True when the patch body contained a "Binary files ... differ"
	/// marker; `patch` is `None` in that case.
	pub binary: bool,
}

/// A raw GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlEnvelope {
	pub data: Option<Value>,
	#[serde(default)]
	pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
	pub message: String,
}

/// The request body for the graph-style POST endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
	pub query: String,
	pub variables: Value,
}
