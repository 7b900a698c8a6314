//! Typed configuration snapshots.
//!
//! The core never reads configuration from ambient global state; callers
//! hand in a [`Config`] value, constructed from whatever on-disk or
//! environment source the host application prefers (that sourcing is an
//! external collaborator, not this crate's concern).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-context base poll cadence, before the rate-limit tracker widens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollContext {
	PrDetail,
	PrList,
	Background,
	Minimized,
	Collaborating,
}

impl PollContext {
	/// Base interval for this context, before rate-limit widening.
	pub fn base_interval(self) -> Duration {
		let secs = match self {
			PollContext::PrDetail => 15,
			PollContext::PrList => 30,
			PollContext::Background => 120,
			PollContext::Minimized => 300,
			PollContext::Collaborating => 10,
		};
		Duration::from_secs(secs)
	}
}

/// Top-level configuration snapshot for the tandem core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub cache: CacheConfig,
	pub retry: RetryConfig,
	pub activity: ActivityConfig,
	pub session: SessionConfig,
	pub peer: PeerConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			cache: CacheConfig::default(),
			retry: RetryConfig::default(),
			activity: ActivityConfig::default(),
			session: SessionConfig::default(),
			peer: PeerConfig::default(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
	pub ttl: Duration,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			ttl: Duration::from_secs(30),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub max_total_wait: Duration,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(250),
			max_delay: Duration::from_secs(2),
			max_total_wait: Duration::from_secs(5),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
	pub dedup_window: Duration,
	pub buffer_capacity: usize,
	pub default_list_limit: usize,
	pub max_list_limit: usize,
}

impl Default for ActivityConfig {
	fn default() -> Self {
		Self {
			dedup_window: Duration::from_millis(750),
			buffer_capacity: 200,
			default_list_limit: 50,
			max_list_limit: 500,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
	pub max_session_lifetime: Duration,
	pub guest_pending_timeout: Duration,
	pub ended_grace_period: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			max_session_lifetime: Duration::from_secs(15 * 60),
			guest_pending_timeout: Duration::from_secs(5 * 60),
			ended_grace_period: Duration::from_secs(60),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
	pub max_retries: u32,
	pub reconnect_base_delay: Duration,
}

impl Default for PeerConfig {
	fn default() -> Self {
		Self {
			max_retries: 5,
			reconnect_base_delay: Duration::from_millis(1000),
		}
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),
}

impl Config {
	pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}
}
