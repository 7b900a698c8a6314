//! The concurrent, read-optimized cache store.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::key::{CacheKey, Scope};

/// One stored cache entry.
#[derive(Debug, Clone)]
struct CacheEntry {
	value: Value,
	updated_at: Instant,
	etag: Option<String>,
}

/// What a stale-read returns: the value as last known, plus any entity-tag
/// to revalidate with.
#[derive(Debug, Clone)]
pub struct StaleRead {
	pub value: Value,
	pub etag: Option<String>,
}

const SHARD_COUNT: usize = 16;

fn shard_for(key: &CacheKey) -> usize {
	use std::hash::{Hash, Hasher};
	let mut hasher = rustc_hash::FxHasher::default();
	key.hash(&mut hasher);
	(hasher.finish() as usize) % SHARD_COUNT
}

/// Read-through cache keyed by structured [`CacheKey`] tuples.
///
/// Internally sharded so that invalidating one scope doesn't contend with
/// reads of an unrelated scope; each shard carries its own lock, as does
/// each of the two scoped indices used for O(k) invalidation.
pub struct EntityCache {
	ttl: Duration,
	shards: Vec<RwLock<FxHashMap<CacheKey, CacheEntry>>>,
	list_index: RwLock<FxHashMap<Scope, FxHashSet<CacheKey>>>,
	detail_index: RwLock<FxHashMap<(Scope, &'static str, u64), FxHashSet<CacheKey>>>,
}

impl EntityCache {
	pub fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			shards: (0..SHARD_COUNT).map(|_| RwLock::new(FxHashMap::default())).collect(),
			list_index: RwLock::new(FxHashMap::default()),
			detail_index: RwLock::new(FxHashMap::default()),
		}
	}

	fn shard(&self, key: &CacheKey) -> &RwLock<FxHashMap<CacheKey, CacheEntry>> {
		&self.shards[shard_for(key)]
	}

	/// Returns a deep copy of the value iff it is still fresh
	/// (`now - updated_at <= ttl`), per spec §8 invariant 2.
	pub fn get_fresh(&self, key: &CacheKey, now: Instant) -> Option<Value> {
		let shard = self.shard(key).read();
		let entry = shard.get(key)?;
		if now.saturating_duration_since(entry.updated_at) <= self.ttl {
			Some(entry.value.clone())
		} else {
			None
		}
	}

	/// Returns the value and entity-tag regardless of freshness, for
	/// revalidation or honoring a not-modified response.
	pub fn get_stale(&self, key: &CacheKey) -> Option<StaleRead> {
		let shard = self.shard(key).read();
		let entry = shard.get(key)?;
		Some(StaleRead {
			value: entry.value.clone(),
			etag: entry.etag.clone(),
		})
	}

	/// Stores a freshly fetched value, registering it in the scoped
	/// indices used for invalidation.
	pub fn set(&self, key: CacheKey, value: Value, etag: Option<String>, now: Instant) {
		self.register_indices(&key);
		self.shard(&key).write().insert(
			key,
			CacheEntry {
				value,
				updated_at: now,
				etag,
			},
		);
	}

	/// Updates only the entity-tag of an existing entry, leaving the value
	/// and timestamp untouched.
	pub fn set_entity_tag(&self, key: &CacheKey, etag: Option<String>) {
		if let Some(entry) = self.shard(key).write().get_mut(key) {
			entry.etag = etag;
		}
	}

	/// Refreshes `updated_at` without altering the stored value — used
	/// after a 304 Not Modified response (spec §8 invariant 3).
	pub fn touch(&self, key: &CacheKey, now: Instant) {
		if let Some(entry) = self.shard(key).write().get_mut(key) {
			entry.updated_at = now;
		}
	}

	fn register_indices(&self, key: &CacheKey) {
		if key.is_list() {
			self.list_index
				.write()
				.entry(key.scope().clone())
				.or_default()
				.insert(key.clone());
		}
		if let Some((resource, number)) = key.detail_group() {
			self.detail_index
				.write()
				.entry((key.scope().clone(), resource, number))
				.or_default()
				.insert(key.clone());
		}
	}

	/// Erases every list key under `scope`, leaving details untouched.
	pub fn invalidate_list_scope(&self, scope: &Scope) {
		let keys = self.list_index.write().remove(scope).unwrap_or_default();
		for key in keys {
			self.shard(&key).write().remove(&key);
		}
	}

	/// Erases a resource's detail and its sub-resources (raw blob, flag,
	/// sub-pages), leaving lists and unrelated details intact.
	pub fn invalidate_detail(&self, scope: &Scope, resource: &'static str, number: u64) {
		let group = (scope.clone(), resource, number);
		let keys = self.detail_index.write().remove(&group).unwrap_or_default();
		for key in keys {
			self.shard(&key).write().remove(&key);
		}
		// The detail key itself is registered under detail_group too, but
		// construct and remove it explicitly in case it was never set.
		let detail_key = CacheKey::Detail {
			scope: scope.clone(),
			resource,
			number,
		};
		self.shard(&detail_key).write().remove(&detail_key);
	}

	/// Combines list-scope and detail invalidation for a mutated resource,
	/// per spec §4.B mutation invalidation.
	pub fn invalidate_mutation(&self, scope: &Scope, resource: &'static str, number: u64) {
		self.invalidate_list_scope(scope);
		self.invalidate_detail(scope, resource, number);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scope() -> Scope {
		Scope::new("acme", "orch")
	}

	#[test]
	fn fresh_read_returns_value_within_ttl() {
		let cache = EntityCache::new(Duration::from_secs(30));
		let key = CacheKey::Detail {
			scope: scope(),
			resource: "pulls",
			number: 42,
		};
		let now = Instant::now();
		cache.set(key.clone(), Value::from(1), None, now);
		assert!(cache.get_fresh(&key, now + Duration::from_secs(10)).is_some());
	}

	#[test]
	fn stale_read_misses_past_ttl() {
		let cache = EntityCache::new(Duration::from_secs(30));
		let key = CacheKey::Detail {
			scope: scope(),
			resource: "pulls",
			number: 42,
		};
		let now = Instant::now();
		cache.set(key.clone(), Value::from(1), None, now);
		assert!(cache.get_fresh(&key, now + Duration::from_secs(31)).is_none());
		assert!(cache.get_stale(&key).is_some());
	}

	#[test]
	fn touch_refreshes_timestamp_without_changing_value() {
		let cache = EntityCache::new(Duration::from_secs(30));
		let key = CacheKey::Detail {
			scope: scope(),
			resource: "pulls",
			number: 42,
		};
		let now = Instant::now();
		cache.set(key.clone(), Value::from("v1"), Some("E1".into()), now);
		let later = now + Duration::from_secs(60);
		cache.touch(&key, later);
		assert!(cache.get_fresh(&key, later).is_some());
		let stale = cache.get_stale(&key).unwrap();
		assert_eq!(stale.value, Value::from("v1"));
		assert_eq!(stale.etag, Some("E1".into()));
	}

	#[test]
	fn list_scope_invalidation_leaves_details_intact() {
		let cache = EntityCache::new(Duration::from_secs(30));
		let now = Instant::now();
		let list_key = CacheKey::List {
			scope: scope(),
			resource: "pulls",
			params: crate::key::ListParams::new(None, 1, 30),
		};
		let detail_key = CacheKey::Detail {
			scope: scope(),
			resource: "pulls",
			number: 42,
		};
		cache.set(list_key.clone(), Value::from("list"), None, now);
		cache.set(detail_key.clone(), Value::from("detail"), None, now);

		cache.invalidate_list_scope(&scope());

		assert!(cache.get_fresh(&list_key, now).is_none());
		assert!(cache.get_fresh(&detail_key, now).is_some());
	}

	#[test]
	fn detail_invalidation_clears_subresources_but_not_lists() {
		let cache = EntityCache::new(Duration::from_secs(30));
		let now = Instant::now();
		let list_key = CacheKey::List {
			scope: scope(),
			resource: "pulls",
			params: crate::key::ListParams::new(None, 1, 30),
		};
		let detail_key = CacheKey::Detail {
			scope: scope(),
			resource: "pulls",
			number: 42,
		};
		let raw_key = CacheKey::RawBlob {
			scope: scope(),
			resource: "pulls",
			number: 42,
		};
		cache.set(list_key.clone(), Value::from("list"), None, now);
		cache.set(detail_key.clone(), Value::from("detail"), None, now);
		cache.set(raw_key.clone(), Value::from("raw"), None, now);

		cache.invalidate_detail(&scope(), "pulls", 42);

		assert!(cache.get_fresh(&list_key, now).is_some());
		assert!(cache.get_fresh(&detail_key, now).is_none());
		assert!(cache.get_fresh(&raw_key, now).is_none());
	}

	#[test]
	fn mutation_invalidation_combines_both() {
		let cache = EntityCache::new(Duration::from_secs(30));
		let now = Instant::now();
		let list_key = CacheKey::List {
			scope: scope(),
			resource: "pulls",
			params: crate::key::ListParams::new(None, 1, 30),
		};
		let detail_key = CacheKey::Detail {
			scope: scope(),
			resource: "pulls",
			number: 42,
		};
		let unrelated_detail = CacheKey::Detail {
			scope: scope(),
			resource: "pulls",
			number: 7,
		};
		cache.set(list_key.clone(), Value::from("list"), None, now);
		cache.set(detail_key.clone(), Value::from("detail"), None, now);
		cache.set(unrelated_detail.clone(), Value::from("other"), None, now);

		cache.invalidate_mutation(&scope(), "pulls", 42);

		assert!(cache.get_fresh(&list_key, now).is_none());
		assert!(cache.get_fresh(&detail_key, now).is_none());
		assert!(cache.get_fresh(&unrelated_detail, now).is_some());
	}
}
