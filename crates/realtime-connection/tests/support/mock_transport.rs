use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use realtime_connection::{Action, ConnectionDetails, ProtocolMessage, Transport, TransportError, TransportListener, WireError};

type ConnectHook = dyn Fn(Arc<dyn TransportListener>) + Send + Sync;
type SendHook = dyn Fn(ProtocolMessage, Arc<dyn TransportListener>) + Send + Sync;

/// A scripted `Transport` test double for the end-to-end connection
/// scenarios, built directly from constructors rather than a mocking
/// framework.
pub struct MockTransport {
	listener: Mutex<Option<Arc<dyn TransportListener>>>,
	on_connect: Option<Box<ConnectHook>>,
	on_send: Option<Box<SendHook>>,
	fail_connect: Option<String>,
	disposed: AtomicBool,
	sent: Mutex<Vec<ProtocolMessage>>,
}

impl MockTransport {
	fn blank() -> Self {
		Self {
			listener: Mutex::new(None),
			on_connect: None,
			on_send: None,
			fail_connect: None,
			disposed: AtomicBool::new(false),
			sent: Mutex::new(Vec::new()),
		}
	}

	/// `connect()` spawns `hook(listener)` and returns `Ok`, matching the
	/// real `WebSocketTransport::connect` contract of returning once the
	/// read loop is spawned rather than once the handshake completes.
	pub fn with_connect_hook(hook: impl Fn(Arc<dyn TransportListener>) + Send + Sync + 'static) -> Self {
		Self {
			on_connect: Some(Box::new(hook)),
			..Self::blank()
		}
	}

	/// `connect()` never calls the listener at all — simulates a transport
	/// that is alive but never reaches a protocol-level `CONNECTED`.
	pub fn silent() -> Self {
		Self::blank()
	}

	/// `connect()` fails outright, as a handshake failure would.
	pub fn failing(message: impl Into<String>) -> Self {
		Self {
			fail_connect: Some(message.into()),
			..Self::blank()
		}
	}

	/// Delivers a `CONNECTED` protocol frame shortly after `connect()`.
	pub fn connects_after(delay: Duration, ttl_ms: Option<u64>) -> Self {
		Self::with_connect_hook(move |listener| {
			tokio::spawn(async move {
				tokio::time::sleep(delay).await;
				listener.on_protocol_message(connected_frame(ttl_ms)).await;
			});
		})
	}

	/// Delivers a connection-scoped `ERROR` frame instead of `CONNECTED`.
	pub fn errors_after(delay: Duration, nonfatal: bool) -> Self {
		Self::with_connect_hook(move |listener| {
			tokio::spawn(async move {
				tokio::time::sleep(delay).await;
				listener.on_protocol_message(error_frame(nonfatal)).await;
			});
		})
	}

	/// Reports a transport-level handshake/protocol failure via
	/// `on_failed` rather than ever forwarding a protocol frame —
	/// distinct from `errors_after`, which simulates the server's own
	/// `ERROR` frame arriving over an otherwise healthy socket.
	pub fn fails_after(delay: Duration, message: impl Into<String> + Send + 'static) -> Self {
		Self::with_connect_hook(move |listener| {
			let message = message.into();
			tokio::spawn(async move {
				tokio::time::sleep(delay).await;
				listener.on_failed(TransportError::Handshake(message)).await;
			});
		})
	}

	/// Attach a hook invoked on every `send()`, e.g. to echo a `HEARTBEAT`
	/// back as the server would.
	#[must_use]
	pub fn with_send_hook(mut self, hook: impl Fn(ProtocolMessage, Arc<dyn TransportListener>) + Send + Sync + 'static) -> Self {
		self.on_send = Some(Box::new(hook));
		self
	}

	pub fn disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}

	pub fn sent_messages(&self) -> Vec<ProtocolMessage> {
		self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn connect(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError> {
		if let Some(message) = &self.fail_connect {
			return Err(TransportError::Handshake(message.clone()));
		}
		*self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Arc::clone(&listener));
		if let Some(hook) = &self.on_connect {
			hook(listener);
		}
		Ok(())
	}

	async fn send(&self, msg: ProtocolMessage) -> Result<(), TransportError> {
		self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(msg.clone());
		if let Some(hook) = &self.on_send {
			let listener = self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
			if let Some(listener) = listener {
				hook(msg, listener);
			}
		}
		Ok(())
	}

	async fn close(&self) -> Result<(), TransportError> {
		let listener = self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
		if let Some(listener) = listener {
			tokio::spawn(async move {
				listener.on_protocol_message(closed_frame()).await;
			});
		}
		Ok(())
	}

	async fn dispose(&self) {
		self.disposed.store(true, Ordering::SeqCst);
		*self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
	}

	fn is_connected(&self) -> bool {
		!self.disposed.load(Ordering::SeqCst)
	}
}

pub fn connected_frame(ttl_ms: Option<u64>) -> ProtocolMessage {
	ProtocolMessage {
		action: Action::Connected as i32,
		id: None,
		error: None,
		channel: None,
		connection_details: Some(ConnectionDetails {
			connection_state_ttl_ms: ttl_ms,
			extra: serde_json::Map::new(),
		}),
		connection_serial: None,
		msg_serial: None,
	}
}

pub fn error_frame(nonfatal: bool) -> ProtocolMessage {
	ProtocolMessage {
		action: Action::Error as i32,
		id: None,
		error: Some(WireError {
			message: "connection refused by server".into(),
			status_code: 403,
			code: 40_100,
			nonfatal,
		}),
		channel: None,
		connection_details: None,
		connection_serial: None,
		msg_serial: None,
	}
}

pub fn closed_frame() -> ProtocolMessage {
	ProtocolMessage {
		action: Action::Closed as i32,
		id: None,
		error: None,
		channel: None,
		connection_details: None,
		connection_serial: None,
		msg_serial: None,
	}
}

pub fn heartbeat_reply(id: impl Into<String>) -> ProtocolMessage {
	ProtocolMessage {
		action: Action::Heartbeat as i32,
		id: Some(id.into()),
		error: None,
		channel: None,
		connection_details: None,
		connection_serial: None,
		msg_serial: None,
	}
}
