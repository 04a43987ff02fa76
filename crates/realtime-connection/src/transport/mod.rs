mod websocket;

pub use websocket::WebSocketTransport;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::ProtocolMessage;

/// Errors intrinsic to the transport itself, distinct from the application
/// error taxonomy in `crate::error` — converted into that taxonomy at the
/// manager boundary.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("websocket handshake failed: {0}")]
	Handshake(String),
	#[error("socket not open")]
	NotOpen,
	#[error("send failed: {0}")]
	Send(String),
}

/// Callbacks the transport drives as connection-level things happen to the
/// socket. Deliberately has no `on_connected` method: the manager is the
/// sole interpreter of protocol actions, so a `CONNECTED` frame is just
/// forwarded like any other frame via `on_protocol_message` and the manager
/// decides what it means.
#[async_trait]
pub trait TransportListener: Send + Sync {
	async fn on_protocol_message(&self, msg: ProtocolMessage);
	async fn on_failed(&self, error: TransportError);
	async fn on_disconnected(&self, error: Option<TransportError>);
}

/// A single WebSocket session to the realtime endpoint. Exactly one
/// instance is owned by the manager at a time.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Initiates the session asynchronously, wiring `listener` for inbound
	/// callbacks. Returns once the read loop has been spawned, not once the
	/// protocol-level handshake completes — that completion arrives later as
	/// an `on_protocol_message` carrying a `CONNECTED` action.
	async fn connect(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError>;

	/// Enqueues a protocol message. Fails if the socket is not open.
	async fn send(&self, msg: ProtocolMessage) -> Result<(), TransportError>;

	/// Sends a protocol `CLOSE` and waits for the socket to drop or an
	/// explicit `close()` acknowledgement; the manager, not the transport,
	/// interprets the resulting `CLOSED` frame.
	async fn close(&self) -> Result<(), TransportError>;

	/// Idempotently tears down the socket and releases resources; guarantees
	/// no further listener callbacks fire after this returns.
	async fn dispose(&self);

	fn is_connected(&self) -> bool;
}
