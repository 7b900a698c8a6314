//! Structured cache keys.
//!
//! The source this cache replaces swept a textual key prefix to invalidate
//! a scope; here every key is a structured tuple so scoped invalidation is
//! a couple of index lookups rather than a linear scan (spec §9 Design
//! Notes).

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(owner, repo)` — the coarsest cache scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
	pub owner: String,
	pub repo: String,
}

impl Scope {
	pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			repo: repo.into(),
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.owner, self.repo)
	}
}

/// A resource's `state` filter, normalized per spec §4.B ("missing ⇒
/// open; case-insensitive").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateFilter {
	Open,
	Closed,
	All,
}

impl StateFilter {
	/// Normalizes a raw, possibly-absent, possibly-mixed-case state string.
	pub fn normalize(raw: Option<&str>) -> Self {
		match raw.map(str::to_ascii_lowercase).as_deref() {
			None => StateFilter::Open,
			Some("closed") => StateFilter::Closed,
			Some("all") => StateFilter::All,
			// The source's list filter silently treats an unrecognized
			// state (e.g. a requested `merged`) as `closed` and expects
			// the caller to post-filter; this is the intended semantic
			// per spec §9 Open Questions.
			Some(_) => StateFilter::Closed,
			Some("open") => StateFilter::Open,
		}
	}
}

/// Normalized list-query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListParams {
	pub state: StateFilter,
	pub page: u32,
	pub per_page: u32,
}

impl ListParams {
	/// Coerces `page`/`per_page` to the bounds in spec §8 ("`per_page`
	/// below 1 is coerced to the default; above 100 clamped").
	pub fn new(state: Option<&str>, page: u32, per_page: u32) -> Self {
		let page = page.max(1);
		let per_page = if per_page < 1 { 30 } else { per_page.min(100) };
		Self {
			state: StateFilter::normalize(state),
			page,
			per_page,
		}
	}
}

/// A fully structured cache key: scope, resource kind, optional
/// sub-resource and item number, optional list parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
	/// A page of a resource list (e.g. open pull requests).
	List {
		scope: Scope,
		resource: &'static str,
		params: ListParams,
	},
	/// The detail view of a single numbered resource.
	Detail {
		scope: Scope,
		resource: &'static str,
		number: u64,
	},
	/// A paginated sub-resource of a numbered resource (commits, files).
	SubResource {
		scope: Scope,
		resource: &'static str,
		number: u64,
		sub_resource: &'static str,
		page: u32,
	},
	/// An opaque raw payload blob for a numbered resource (e.g. a diff).
	RawBlob {
		scope: Scope,
		resource: &'static str,
		number: u64,
	},
	/// A boolean flag derived from a numbered resource (e.g. merge status).
	Flag {
		scope: Scope,
		resource: &'static str,
		number: u64,
		flag: &'static str,
	},
	/// An umbrella collection not tied to a single numbered resource.
	Umbrella { scope: Scope, resource: &'static str },
}

impl CacheKey {
	pub fn scope(&self) -> &Scope {
		match self {
			CacheKey::List { scope, .. }
			| CacheKey::Detail { scope, .. }
			| CacheKey::SubResource { scope, .. }
			| CacheKey::RawBlob { scope, .. }
			| CacheKey::Flag { scope, .. }
			| CacheKey::Umbrella { scope, .. } => scope,
		}
	}

	pub fn is_list(&self) -> bool {
		matches!(self, CacheKey::List { .. })
	}

	/// The `(resource, number)` this key's detail-scoped group is indexed
	/// under, if it has one.
	pub fn detail_group(&self) -> Option<(&'static str, u64)> {
		match self {
			CacheKey::Detail { resource, number, .. }
			| CacheKey::SubResource { resource, number, .. }
			| CacheKey::RawBlob { resource, number, .. }
			| CacheKey::Flag { resource, number, .. } => Some((resource, *number)),
			CacheKey::List { .. } | CacheKey::Umbrella { .. } => None,
		}
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CacheKey::List { scope, resource, params } => {
				write!(
					f,
					"{scope}:{resource}:list:state={:?},page={},per_page={}",
					params.state, params.page, params.per_page
				)
			}
			CacheKey::Detail { scope, resource, number } => {
				write!(f, "{scope}:{resource}:{number}")
			}
			CacheKey::SubResource {
				scope,
				resource,
				number,
				sub_resource,
				page,
			} => write!(f, "{scope}:{resource}:{number}:{sub_resource}:page={page}"),
			CacheKey::RawBlob { scope, resource, number } => {
				write!(f, "{scope}:{resource}:{number}:raw")
			}
			CacheKey::Flag { scope, resource, number, flag } => {
				write!(f, "{scope}:{resource}:{number}:flag:{flag}")
			}
			CacheKey::Umbrella { scope, resource } => write!(f, "{scope}:{resource}:umbrella"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn state_filter_defaults_to_open() {
		assert_eq!(StateFilter::normalize(None), StateFilter::Open);
	}

	#[test]
	fn state_filter_is_case_insensitive() {
		assert_eq!(StateFilter::normalize(Some("CLOSED")), StateFilter::Closed);
	}

	#[test]
	fn merged_state_falls_back_to_closed() {
		assert_eq!(StateFilter::normalize(Some("merged")), StateFilter::Closed);
	}

	#[test]
	fn per_page_below_one_uses_default() {
		let params = ListParams::new(None, 1, 0);
		assert_eq!(params.per_page, 30);
	}

	#[test]
	fn per_page_above_100_is_clamped() {
		let params = ListParams::new(None, 1, 500);
		assert_eq!(params.per_page, 100);
	}

	#[test]
	fn page_below_one_is_coerced_to_one() {
		let params = ListParams::new(None, 0, 30);
		assert_eq!(params.page, 1);
	}
}
