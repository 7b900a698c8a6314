//! The three telemetry event families.

use std::time::Duration;

use tandem_core::ErrorKind;

/// Whether a request was served from cache or went to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
	Hit,
	Miss,
}

/// The closed set of mutating action names telemetry can report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
	Create,
	Update,
	Merge,
	UpdateBranch,
	LabelCreate,
	InlineCommentCreate,
}

impl Action {
	pub fn as_str(self) -> &'static str {
		match self {
			Action::Create => "create",
			Action::Update => "update",
			Action::Merge => "merge",
			Action::UpdateBranch => "update-branch",
			Action::LabelCreate => "label-create",
			Action::InlineCommentCreate => "inline-comment-create",
		}
	}
}

/// Emitted once per upstream request, cache hit or miss included.
#[derive(Debug, Clone)]
pub struct RequestEvent {
	pub method: &'static str,
	pub endpoint: String,
	pub status: u16,
	pub duration: Duration,
	pub cache: CacheOutcome,
	pub rate_remaining: Option<u32>,
}

/// Emitted whenever the cache is consulted, independent of whether the
/// caller ultimately issues a network request.
#[derive(Debug, Clone)]
pub struct CacheEvent {
	pub method: &'static str,
	pub endpoint: String,
	pub cache: CacheOutcome,
}

/// Emitted once per mutating call, after the upstream response (or local
/// validation failure) is known.
#[derive(Debug, Clone)]
pub struct ActionEvent {
	pub action: Action,
	pub method: &'static str,
	pub endpoint: String,
	pub status: u16,
	pub duration: Duration,
	pub success: bool,
	pub rate_remaining: Option<u32>,
	pub error_kind: Option<ErrorKind>,
}
