//! The peer connection actor: `PeerCmd` / `PeerHandle` / `PeerConnection`,
//! mirroring `xeno-broker`'s session-service split.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tandem_core::UserId;
use tandem_crdt::Register;
use tokio::sync::{broadcast, mpsc};

use crate::events::PeerEvent;
use crate::frame::Frame;
use crate::lane::{ChatMessage, ControlEvent, CursorBeacon, Lane, RemoteServiceStatePayload, TerminalIoPayload};
use crate::state::{PeerState, ReconnectDecision, ReconnectState};
use crate::transport::{PeerTransport, TransportEvent};

/// A local mutation to apply to the shared-input register.
#[derive(Debug, Clone)]
pub enum LocalEdit {
	ReplaceAll(String),
	Append(String),
}

#[derive(Debug)]
pub enum PeerCmd {
	ApplyLocalEdit(LocalEdit),
	SendCursor(CursorBeacon),
	SendControl(ControlEvent),
	SendChat(String),
	BroadcastRemoteServiceState(String),
	Destroy,
}

/// Clone-able handle to a running peer connection.
#[derive(Clone)]
pub struct PeerHandle {
	tx: mpsc::Sender<PeerCmd>,
	destroyed: Arc<AtomicBool>,
}

impl PeerHandle {
	pub async fn apply_local_edit(&self, edit: LocalEdit) {
		let _ = self.tx.send(PeerCmd::ApplyLocalEdit(edit)).await;
	}

	pub async fn send_cursor(&self, beacon: CursorBeacon) {
		let _ = self.tx.send(PeerCmd::SendCursor(beacon)).await;
	}

	pub async fn send_control(&self, event: ControlEvent) {
		let _ = self.tx.send(PeerCmd::SendControl(event)).await;
	}

	pub async fn send_chat(&self, text: impl Into<String>) {
		let _ = self.tx.send(PeerCmd::SendChat(text.into())).await;
	}

	pub async fn broadcast_remote_service_state(&self, json: impl Into<String>) {
		let _ = self.tx.send(PeerCmd::BroadcastRemoteServiceState(json.into())).await;
	}

	/// Tears the connection down. Idempotent: a second call after the
	/// first is a no-op (spec §8 round-trip property).
	pub async fn destroy(&self) {
		if self.destroyed.swap(true, Ordering::SeqCst) {
			return;
		}
		let _ = self.tx.send(PeerCmd::Destroy).await;
	}
}

pub struct PeerConnection {
	rx: mpsc::Receiver<PeerCmd>,
	transport: Arc<dyn PeerTransport>,
	register: Arc<Mutex<Register>>,
	local_user: UserId,
	state: PeerState,
	reconnect: ReconnectState,
	destroyed: Arc<AtomicBool>,
	events: broadcast::Sender<PeerEvent>,
}

impl PeerConnection {
	/// Spawns the connection actor and returns a handle plus an event
	/// subscription.
	pub fn start(transport: Arc<dyn PeerTransport>, register: Arc<Mutex<Register>>, local_user: UserId) -> (PeerHandle, broadcast::Receiver<PeerEvent>) {
		let (tx, rx) = mpsc::channel(64);
		let (events, events_rx) = broadcast::channel(64);
		let destroyed = Arc::new(AtomicBool::new(false));
		let connection = Self {
			rx,
			transport,
			register,
			local_user,
			state: PeerState::New,
			reconnect: ReconnectState::new(),
			destroyed: destroyed.clone(),
			events,
		};
		tokio::spawn(connection.run());
		(PeerHandle { tx, destroyed }, events_rx)
	}

	async fn run(mut self) {
		self.state = PeerState::Connecting;
		if let Err(err) = self.transport.connect().await {
			tracing::warn!(error = %err, "initial connect failed");
		}

		loop {
			if self.destroyed.load(Ordering::SeqCst) {
				break;
			}
			tokio::select! {
				cmd = self.rx.recv() => {
					match cmd {
						Some(cmd) => self.handle_cmd(cmd).await,
						None => break,
					}
				}
				event = self.transport.next_event() => {
					match event {
						Ok(TransportEvent::Connected) => self.handle_connected().await,
						Ok(TransportEvent::Disconnected) => {
							if self.handle_disconnected().await {
								break;
							}
						}
						Ok(TransportEvent::Frame { lane, bytes }) => self.handle_frame(lane, bytes).await,
						Err(err) => {
							tracing::warn!(error = %err, "transport error");
							if self.handle_disconnected().await {
								break;
							}
						}
					}
				}
			}
		}

		self.transport.close().await;
		let _ = self.events.send(PeerEvent::Closed);
	}

	async fn handle_connected(&mut self) {
		self.state = PeerState::Connected;
		self.reconnect.reset();
		tracing::info!("peer connected");
		let _ = self.events.send(PeerEvent::Connected);
		let snapshot = self.register.lock().snapshot();
		self.send_terminal(TerminalIoPayload::Snapshot { text: snapshot }).await;
	}

	/// Returns `true` when the caller should stop the actor loop (the
	/// connection has given up for good).
	async fn handle_disconnected(&mut self) -> bool {
		if self.destroyed.load(Ordering::SeqCst) {
			return true;
		}
		match self.reconnect.on_disconnected() {
			ReconnectDecision::RetryAfter(delay) => {
				self.state = PeerState::Connecting;
				tracing::debug!(delay_ms = delay.as_millis() as u64, "reconnecting");
				tokio::time::sleep(delay).await;
				if self.destroyed.load(Ordering::SeqCst) {
					return true;
				}
				if let Err(err) = self.transport.connect().await {
					tracing::warn!(error = %err, "reconnect attempt failed");
				}
				false
			}
			ReconnectDecision::GiveUp => {
				self.state = PeerState::Failed;
				tracing::error!("peer connection failed after max retries");
				let _ = self.events.send(PeerEvent::Failed);
				true
			}
		}
	}

	async fn handle_cmd(&mut self, cmd: PeerCmd) {
		match cmd {
			PeerCmd::ApplyLocalEdit(edit) => self.apply_local_edit(edit).await,
			PeerCmd::SendCursor(beacon) => self.send_lane(Lane::CursorAwareness, "beacon", &beacon).await,
			PeerCmd::SendControl(event) => self.send_lane(Lane::Control, "event", &event).await,
			PeerCmd::SendChat(text) => self.send_lane(Lane::Chat, "message", &ChatMessage { text }).await,
			PeerCmd::BroadcastRemoteServiceState(json) => {
				self.send_lane(Lane::RemoteServiceState, "state", &RemoteServiceStatePayload { json }).await;
			}
			PeerCmd::Destroy => {
				self.destroyed.store(true, Ordering::SeqCst);
			}
		}
	}

	async fn apply_local_edit(&mut self, edit: LocalEdit) {
		let blob = {
			let mut register = self.register.lock();
			match edit {
				LocalEdit::ReplaceAll(text) => register.replace_all(&text),
				LocalEdit::Append(fragment) => register.append(&fragment),
			}
		};
		self.send_terminal(TerminalIoPayload::Update { blob: blob.encode() }).await;
	}

	async fn send_terminal(&self, payload: TerminalIoPayload) {
		let frame_type = match payload {
			TerminalIoPayload::Snapshot { .. } => "snapshot",
			TerminalIoPayload::Update { .. } => "update",
		};
		self.send_lane(Lane::TerminalIo, frame_type, &payload).await;
	}

	async fn send_lane<T: serde::Serialize>(&self, lane: Lane, frame_type: &str, payload: &T) {
		let Ok(payload_bytes) = postcard::to_allocvec(payload) else {
			tracing::error!("failed to encode outbound payload");
			return;
		};
		let frame = Frame {
			lane,
			frame_type: frame_type.to_string(),
			payload: payload_bytes,
			from_user: self.local_user,
			timestamp_ms: Utc::now().timestamp_millis(),
		};
		let Ok(bytes) = frame.encode() else {
			tracing::error!("failed to encode outbound frame");
			return;
		};
		if let Err(err) = self.transport.send(lane, bytes).await {
			tracing::warn!(error = %err, "send failed");
		}
	}

	async fn handle_frame(&mut self, lane: Lane, bytes: Vec<u8>) {
		let frame = match Frame::decode(&bytes) {
			Ok(frame) => frame,
			Err(err) => {
				tracing::warn!(error = %err, "malformed frame discarded");
				return;
			}
		};
		if frame.lane != lane {
			tracing::warn!("frame lane mismatch with transport-reported lane, discarding");
			return;
		}
		match (lane, frame.frame_type.as_str()) {
			(Lane::TerminalIo, "snapshot") => self.on_terminal_snapshot(&frame.payload),
			(Lane::TerminalIo, "update") => self.on_terminal_update(&frame.payload),
			(Lane::CursorAwareness, "beacon") => self.on_cursor(frame.from_user, &frame.payload),
			(Lane::Control, "event") => self.on_control(frame.from_user, &frame.payload),
			(Lane::Chat, "message") => self.on_chat(frame.from_user, &frame.payload),
			(Lane::RemoteServiceState, "state") => self.on_remote_service_state(&frame.payload),
			_ => tracing::debug!(lane = ?lane, frame_type = %frame.frame_type, "unknown type on known lane, ignored"),
		}
	}

	fn on_terminal_snapshot(&mut self, payload: &[u8]) {
		let Ok(TerminalIoPayload::Snapshot { text }) = postcard::from_bytes(payload) else {
			tracing::warn!("malformed terminal snapshot discarded");
			return;
		};
		self.register.lock().hydrate(&text);
		let snapshot = self.register.lock().snapshot();
		let _ = self.events.send(PeerEvent::TerminalUpdated { snapshot });
	}

	fn on_terminal_update(&mut self, payload: &[u8]) {
		let Ok(TerminalIoPayload::Update { blob }) = postcard::from_bytes(payload) else {
			tracing::warn!("malformed terminal update discarded");
			return;
		};
		let Ok(blob) = tandem_crdt::UpdateBlob::decode(&blob) else {
			tracing::warn!("malformed terminal update blob discarded");
			return;
		};
		let snapshot = {
			let mut register = self.register.lock();
			register.apply_remote(&blob);
			register.snapshot()
		};
		let _ = self.events.send(PeerEvent::TerminalUpdated { snapshot });
	}

	fn on_cursor(&self, from: UserId, payload: &[u8]) {
		let Ok(beacon): Result<CursorBeacon, _> = postcard::from_bytes(payload) else {
			tracing::warn!("malformed cursor beacon discarded");
			return;
		};
		let _ = self.events.send(PeerEvent::Cursor { from, beacon });
	}

	fn on_control(&self, from: UserId, payload: &[u8]) {
		let Ok(event): Result<ControlEvent, _> = postcard::from_bytes(payload) else {
			tracing::warn!("malformed control event discarded");
			return;
		};
		let _ = self.events.send(PeerEvent::Control { from, event });
	}

	fn on_chat(&self, from: UserId, payload: &[u8]) {
		let Ok(message): Result<ChatMessage, _> = postcard::from_bytes(payload) else {
			tracing::warn!("malformed chat message discarded");
			return;
		};
		let _ = self.events.send(PeerEvent::Chat { from, message });
	}

	fn on_remote_service_state(&self, payload: &[u8]) {
		let Ok(state): Result<RemoteServiceStatePayload, _> = postcard::from_bytes(payload) else {
			tracing::warn!("malformed remote service state discarded");
			return;
		};
		let _ = self.events.send(PeerEvent::RemoteServiceState { json: state.json });
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex as StdMutex;
	use tokio::sync::Notify;

	struct MockTransport {
		events: StdMutex<std::collections::VecDeque<TransportEvent>>,
		notify: Notify,
		sent: StdMutex<Vec<(Lane, Vec<u8>)>>,
	}

	impl MockTransport {
		fn new(events: Vec<TransportEvent>) -> Self {
			Self {
				events: StdMutex::new(events.into()),
				notify: Notify::new(),
				sent: StdMutex::new(Vec::new()),
			}
		}

		fn push(&self, event: TransportEvent) {
			self.events.lock().unwrap().push_back(event);
			self.notify.notify_one();
		}
	}

	#[async_trait::async_trait]
	impl PeerTransport for MockTransport {
		async fn connect(&self) -> Result<(), tandem_core::Error> {
			Ok(())
		}

		async fn send(&self, lane: Lane, bytes: Vec<u8>) -> Result<(), tandem_core::Error> {
			self.sent.lock().unwrap().push((lane, bytes));
			Ok(())
		}

		async fn next_event(&self) -> Result<TransportEvent, tandem_core::Error> {
			loop {
				if let Some(event) = self.events.lock().unwrap().pop_front() {
					return Ok(event);
				}
				self.notify.notified().await;
			}
		}

		async fn close(&self) {}
	}

	#[tokio::test]
	async fn connect_sends_terminal_snapshot() {
		let register = Arc::new(Mutex::new(Register::new(1)));
		register.lock().append("hello");
		let transport = Arc::new(MockTransport::new(vec![TransportEvent::Connected]));
		let (handle, mut events) = PeerConnection::start(transport.clone(), register, UserId::new());

		let event = events.recv().await.unwrap();
		assert!(matches!(event, PeerEvent::Connected));

		// give the actor a beat to process the Connected branch and send
		tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		assert_eq!(transport.sent.lock().unwrap().len(), 1);
		handle.destroy().await;
	}

	#[tokio::test]
	async fn destroy_is_idempotent() {
		let register = Arc::new(Mutex::new(Register::new(1)));
		let transport = Arc::new(MockTransport::new(vec![]));
		let (handle, _events) = PeerConnection::start(transport, register, UserId::new());
		handle.destroy().await;
		handle.destroy().await;
	}

	#[tokio::test]
	async fn remote_update_applies_and_emits_event() {
		let register = Arc::new(Mutex::new(Register::new(1)));
		let transport = Arc::new(MockTransport::new(vec![]));
		let (handle, mut events) = PeerConnection::start(transport.clone(), register.clone(), UserId::new());

		let mut source = Register::new(2);
		let blob = source.append("hi");
		let payload = postcard::to_allocvec(&TerminalIoPayload::Update { blob: blob.encode() }).unwrap();
		let frame = Frame {
			lane: Lane::TerminalIo,
			frame_type: "update".into(),
			payload,
			from_user: UserId::new(),
			timestamp_ms: 0,
		};
		transport.push(TransportEvent::Frame {
			lane: Lane::TerminalIo,
			bytes: frame.encode().unwrap(),
		});

		let event = events.recv().await.unwrap();
		match event {
			PeerEvent::TerminalUpdated { snapshot } => assert_eq!(snapshot, "hi"),
			other => panic!("unexpected event {other:?}"),
		}
		handle.destroy().await;
	}
}
