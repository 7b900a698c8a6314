//! The per-repository poll actor (spec §4.D).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tandem_cache::{EntityCache, Scope};
use tandem_core::config::PollContext;
use tandem_ratelimit::RateLimitTracker;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::change::{classify, Change};
use crate::source::{DeltaSource, PollTarget};

/// Commands accepted by a running [`RepoPoller`].
#[derive(Debug)]
pub enum PollCmd {
	/// Updates the UI-driven context, re-deriving the base cadence on the
	/// next tick.
	SetContext(PollContext),
	Shutdown,
}

/// Clone-able handle to a running repo poller.
#[derive(Clone, Debug)]
pub struct PollerHandle {
	tx: mpsc::Sender<PollCmd>,
	cancel: CancellationToken,
}

impl PollerHandle {
	pub async fn set_context(&self, context: PollContext) {
		let _ = self.tx.send(PollCmd::SetContext(context)).await;
	}

	/// Cancels the poller's task; idempotent.
	pub fn shutdown(&self) {
		self.cancel.cancel();
	}
}

/// An event surfaced by a poll tick, for the daemon to fan out to
/// interested sessions.
#[derive(Debug, Clone)]
pub enum PollerEvent {
	Changed { target: PollTarget, changes: Vec<Change> },
	RateLimited { target: PollTarget },
}

/// Owns one repository's poll state: high-water mark, context, and the
/// collaborators it reads through.
pub struct RepoPoller {
	rx: mpsc::Receiver<PollCmd>,
	cancel: CancellationToken,
	target: PollTarget,
	scope: Scope,
	context: PollContext,
	high_water_mark: DateTime<Utc>,
	source: Arc<dyn DeltaSource>,
	cache: Arc<EntityCache>,
	tracker: RateLimitTracker,
	events: mpsc::Sender<PollerEvent>,
}

impl RepoPoller {
	/// Spawns the poller task and returns a handle to it.
	pub fn start(
		target: PollTarget,
		context: PollContext,
		source: Arc<dyn DeltaSource>,
		cache: Arc<EntityCache>,
		tracker: RateLimitTracker,
		events: mpsc::Sender<PollerEvent>,
	) -> PollerHandle {
		let (tx, rx) = mpsc::channel(8);
		let cancel = CancellationToken::new();
		let scope = Scope::new(target.owner.clone(), target.repo.clone());
		let poller = Self {
			rx,
			cancel: cancel.clone(),
			target,
			scope,
			context,
			high_water_mark: Utc::now(),
			source,
			cache,
			tracker,
			events,
		};
		tokio::spawn(poller.run());
		PollerHandle { tx, cancel }
	}

	async fn run(mut self) {
		loop {
			let wait = self.tracker.safe_interval(self.context.base_interval());
			tokio::select! {
				_ = self.cancel.cancelled() => {
					tracing::info!(owner = %self.target.owner, repo = %self.target.repo, "poller cancelled");
					return;
				}
				cmd = self.rx.recv() => {
					match cmd {
						Some(PollCmd::SetContext(context)) => {
							self.context = context;
						}
						Some(PollCmd::Shutdown) | None => {
							tracing::info!(owner = %self.target.owner, repo = %self.target.repo, "poller shut down");
							return;
						}
					}
				}
				_ = tokio::time::sleep(wait) => {
					self.tick().await;
				}
			}
		}
	}

	async fn tick(&mut self) {
		if !self.tracker.should_poll() {
			tracing::debug!(owner = %self.target.owner, repo = %self.target.repo, "rate limit exhausted, skipping tick");
			let _ = self.events.send(PollerEvent::RateLimited { target: self.target.clone() }).await;
			return;
		}

		let items = match self.source.query_delta(&self.target, 30).await {
			Ok(items) => items,
			Err(err) => {
				tracing::warn!(owner = %self.target.owner, repo = %self.target.repo, error = %err, "delta query failed");
				return;
			}
		};

		let prior_high_water_mark = self.high_water_mark;
		let mut changes = Vec::new();
		for item in items {
			if item.updated_at > prior_high_water_mark {
				changes.push(Change {
					resource: item.resource,
					number: item.number,
					updated_at: item.updated_at,
					kind: classify(item.updated_at, prior_high_water_mark),
				});
			}
		}

		if changes.is_empty() {
			return;
		}

		self.cache.invalidate_list_scope(&self.scope);
		if let Some(max) = changes.iter().map(|c| c.updated_at).max() {
			self.high_water_mark = max;
		}
		tracing::info!(owner = %self.target.owner, repo = %self.target.repo, count = changes.len(), "poll detected changes");
		let _ = self
			.events
			.send(PollerEvent::Changed {
				target: self.target.clone(),
				changes,
			})
			.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::time::Duration;
	use tandem_core::Error;

	struct FixedSource {
		items: Vec<crate::source::DeltaItem>,
		calls: AtomicU32,
	}

	#[async_trait::async_trait]
	impl DeltaSource for FixedSource {
		async fn query_delta(&self, _target: &PollTarget, _page_size: u32) -> Result<Vec<crate::source::DeltaItem>, Error> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(self.items.clone())
		}
	}

	#[tokio::test(start_paused = true)]
	async fn tick_advances_high_water_mark_and_invalidates_cache() {
		let cache = Arc::new(EntityCache::new(Duration::from_secs(30)));
		let scope = Scope::new("acme", "orch");
		let list_key = tandem_cache::CacheKey::List {
			scope: scope.clone(),
			resource: "pulls",
			params: tandem_cache::ListParams::new(None, 1, 30),
		};
		cache.set(list_key.clone(), serde_json::Value::from("cached"), None, std::time::Instant::now());

		let now = Utc::now();
		let source = Arc::new(FixedSource {
			items: vec![crate::source::DeltaItem {
				resource: "pulls",
				number: 42,
				updated_at: now + chrono::Duration::seconds(60),
			}],
			calls: AtomicU32::new(0),
		});
		let tracker = RateLimitTracker::new();
		tracker.observe(5000, 5000, None);
		let (events_tx, mut events_rx) = mpsc::channel(4);

		let target = PollTarget::new("acme", "orch");
		let mut poller = RepoPoller {
			rx: mpsc::channel(1).1,
			cancel: CancellationToken::new(),
			target: target.clone(),
			scope,
			context: PollContext::Collaborating,
			high_water_mark: now,
			source,
			cache: cache.clone(),
			tracker,
			events: events_tx,
		};

		poller.tick().await;

		assert!(cache.get_fresh(&list_key, std::time::Instant::now()).is_none());
		let event = events_rx.recv().await.unwrap();
		match event {
			PollerEvent::Changed { target: t, changes } => {
				assert_eq!(t, target);
				assert_eq!(changes.len(), 1);
			}
			other => panic!("expected Changed, got {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn tick_skips_query_when_rate_limited() {
		let cache = Arc::new(EntityCache::new(Duration::from_secs(30)));
		let source = Arc::new(FixedSource {
			items: vec![],
			calls: AtomicU32::new(0),
		});
		let tracker = RateLimitTracker::new();
		tracker.observe(10, 5000, None);
		let (events_tx, mut events_rx) = mpsc::channel(4);

		let mut poller = RepoPoller {
			rx: mpsc::channel(1).1,
			cancel: CancellationToken::new(),
			target: PollTarget::new("acme", "orch"),
			scope: Scope::new("acme", "orch"),
			context: PollContext::Background,
			high_water_mark: Utc::now(),
			source: source.clone(),
			cache,
			tracker,
			events: events_tx,
		};

		poller.tick().await;

		assert_eq!(source.calls.load(Ordering::SeqCst), 0);
		assert!(matches!(events_rx.recv().await, Some(PollerEvent::RateLimited { .. })));
	}
}
