//! The activity actor: `ActivityCmd` / `ActivityHandle` / `ActivityService`,
//! wrapping [`ActivityBuffer`] the same way `BrokerService` wraps its
//! session list, with a periodic prune tick standing in for
//! `BrokerService`'s expired-guest sweep.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

use crate::buffer::ActivityBuffer;
use crate::event::{ActivityEvent, ListOptions, NewActivityEvent};

#[derive(Debug)]
pub enum ActivityCmd {
	Append {
		event: NewActivityEvent,
		reply: oneshot::Sender<(ActivityEvent, bool)>,
	},
	List {
		opts: ListOptions,
		reply: oneshot::Sender<Vec<ActivityEvent>>,
	},
}

#[derive(Clone, Debug)]
pub struct ActivityHandle {
	tx: mpsc::Sender<ActivityCmd>,
}

impl ActivityHandle {
	pub fn new(tx: mpsc::Sender<ActivityCmd>) -> Self {
		Self { tx }
	}

	/// Returns the canonical event and whether it was newly accepted
	/// (`false` when collapsed by dedup — spec §4.I).
	pub async fn append(&self, event: NewActivityEvent) -> (ActivityEvent, bool) {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(ActivityCmd::Append { event, reply })
			.await
			.expect("activity actor outlives every handle");
		rx.await.expect("activity actor never drops a reply sender")
	}

	pub async fn list(&self, opts: ListOptions) -> Vec<ActivityEvent> {
		let (reply, rx) = oneshot::channel();
		if self.tx.send(ActivityCmd::List { opts, reply }).await.is_err() {
			return Vec::new();
		}
		rx.await.unwrap_or_default()
	}
}

pub struct ActivityService {
	rx: mpsc::Receiver<ActivityCmd>,
	buffer: ActivityBuffer,
	prune_interval: Duration,
}

impl ActivityService {
	/// `dedup_window` floors the prune cadence at 2 seconds, per spec §4.I
	/// ("pruned at six times the dedup window, floored at 2s").
	pub fn start(capacity: usize, dedup_window: Duration) -> ActivityHandle {
		let (tx, rx) = mpsc::channel(256);
		let prune_interval = (dedup_window * 6).max(Duration::from_secs(2));
		let service = Self {
			rx,
			buffer: ActivityBuffer::new(capacity, dedup_window),
			prune_interval,
		};
		tokio::spawn(service.run());
		ActivityHandle::new(tx)
	}

	async fn run(mut self) {
		let mut prune = tokio::time::interval(self.prune_interval);
		loop {
			tokio::select! {
				cmd = self.rx.recv() => {
					match cmd {
						Some(cmd) => self.handle(cmd, Instant::now()),
						None => return,
					}
				}
				_ = prune.tick() => self.buffer.prune_dedup(Instant::now()),
			}
		}
	}

	fn handle(&mut self, cmd: ActivityCmd, now: Instant) {
		match cmd {
			ActivityCmd::Append { event, reply } => {
				let (canonical, accepted) = self.buffer.append(event, now);
				if accepted {
					tracing::debug!(event = ?canonical.id, kind = %canonical.kind, "activity event accepted");
				}
				let _ = reply.send((canonical, accepted));
			}
			ActivityCmd::List { opts, reply } => {
				let _ = reply.send(self.buffer.list(&opts));
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tandem_cache::Scope;

	fn event(dedup_key: &str) -> NewActivityEvent {
		NewActivityEvent {
			kind: "branch".into(),
			scope: Scope::new("acme", "orch"),
			subject_path: "/tmp/repo".into(),
			branch: Some("main".into()),
			message: "branch updated".into(),
			details: serde_json::json!({}),
			dedup_key: dedup_key.into(),
		}
	}

	#[tokio::test]
	async fn append_then_list_round_trips() {
		let handle = ActivityService::start(200, Duration::from_millis(750));
		let (first, accepted) = handle.append(event("k1")).await;
		assert!(accepted);

		let listed = handle.list(ListOptions::default()).await;
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].id, first.id);
	}

	#[tokio::test]
	async fn duplicate_within_window_is_not_accepted() {
		let handle = ActivityService::start(200, Duration::from_millis(750));
		handle.append(event("dup")).await;
		let (_, accepted) = handle.append(event("dup")).await;
		assert!(!accepted);
	}
}
