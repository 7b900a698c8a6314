//! Read-through entity cache with TTL, staleness, and entity-tag memory
//! (spec §4.B).

pub mod key;
pub mod store;

pub use key::{CacheKey, ListParams, Scope, StateFilter};
pub use store::{EntityCache, StaleRead};
