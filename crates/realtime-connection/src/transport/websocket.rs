use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Transport, TransportError, TransportListener};
use crate::protocol::ProtocolMessage;

type Sink = futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// The production `Transport`, built on `tokio-tungstenite`.
pub struct WebSocketTransport {
	url: String,
	sink: Mutex<Option<Sink>>,
	read_task: Mutex<Option<JoinHandle<()>>>,
	connected: Arc<AtomicBool>,
}

impl WebSocketTransport {
	#[must_use]
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			sink: Mutex::new(None),
			read_task: Mutex::new(None),
			connected: Arc::new(AtomicBool::new(false)),
		}
	}
}

#[async_trait]
impl Transport for WebSocketTransport {
	async fn connect(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError> {
		let (stream, _response) = connect_async(&self.url).await.map_err(|err| TransportError::Handshake(err.to_string()))?;
		let (sink, mut source) = stream.split();
		*self.sink.lock().await = Some(sink);

		let connected = Arc::clone(&self.connected);
		let handle = tokio::spawn(async move {
			read_loop(&mut source, listener, connected).await;
		});
		*self.read_task.lock().await = Some(handle);

		Ok(())
	}

	async fn send(&self, msg: ProtocolMessage) -> Result<(), TransportError> {
		let mut guard = self.sink.lock().await;
		let sink = guard.as_mut().ok_or(TransportError::NotOpen)?;
		let body = serde_json::to_string(&msg).map_err(|err| TransportError::Send(err.to_string()))?;
		sink.send(WsMessage::Text(body.into())).await.map_err(|err| TransportError::Send(err.to_string()))
	}

	async fn close(&self) -> Result<(), TransportError> {
		self.send(ProtocolMessage::close()).await?;
		let mut guard = self.sink.lock().await;
		if let Some(sink) = guard.as_mut() {
			let _ = sink.close().await;
		}
		Ok(())
	}

	async fn dispose(&self) {
		self.connected.store(false, Ordering::SeqCst);
		if let Some(handle) = self.read_task.lock().await.take() {
			handle.abort();
		}
		*self.sink.lock().await = None;
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}
}

/// Reports socket termination, distinguishing a failure before the
/// protocol-level `CONNECTED` handshake completed from an unexpected
/// closure afterward.
async fn report_termination(listener: &Arc<dyn TransportListener>, connected: &AtomicBool, error: Option<TransportError>) {
	if connected.load(Ordering::SeqCst) {
		listener.on_disconnected(error).await;
	} else {
		listener.on_failed(error.unwrap_or_else(|| TransportError::Handshake("socket closed before handshake completed".into()))).await;
	}
}

async fn read_loop(
	source: &mut futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
	listener: Arc<dyn TransportListener>,
	connected: Arc<AtomicBool>,
) {
	while let Some(next) = source.next().await {
		match next {
			Ok(WsMessage::Text(text)) => match serde_json::from_str::<ProtocolMessage>(&text) {
				Ok(msg) => {
					if crate::protocol::Action::Connected.matches(msg.action) {
						connected.store(true, Ordering::SeqCst);
					}
					listener.on_protocol_message(msg).await;
				}
				Err(error) => tracing::warn!(%error, "dropped malformed protocol frame"),
			},
			Ok(WsMessage::Close(_)) => {
				report_termination(&listener, &connected, None).await;
				return;
			}
			Ok(_) => {}
			Err(error) => {
				report_termination(&listener, &connected, Some(TransportError::Send(error.to_string()))).await;
				return;
			}
		}
	}
	report_termination(&listener, &connected, None).await;
}
