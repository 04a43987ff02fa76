pub mod mock_transport;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use realtime_connection::{Connection, ConnectionEvent, ConnectionStateChange};
use tokio::sync::mpsc;

pub use mock_transport::MockTransport;
use realtime_connection::ConnectivityCheck;

/// A `ConnectivityCheck` double that always returns a fixed answer, so
/// retry-path scenarios don't make a real HTTP request.
pub struct StubConnectivity {
	reachable: AtomicBool,
}

impl StubConnectivity {
	#[must_use]
	pub fn always(reachable: bool) -> Self {
		Self { reachable: AtomicBool::new(reachable) }
	}
}

#[async_trait]
impl ConnectivityCheck for StubConnectivity {
	async fn check(&self) -> bool {
		self.reachable.load(Ordering::SeqCst)
	}
}

/// Subscribes to every `ConnectionEvent` variant and forwards each
/// `ConnectionStateChange` onto a single channel, so a test can assert on
/// emission order without one `on()` closure per event.
pub fn subscribe_all(connection: &Connection) -> mpsc::UnboundedReceiver<ConnectionStateChange> {
	let (tx, rx) = mpsc::unbounded_channel();
	for event in [
		ConnectionEvent::Initialized,
		ConnectionEvent::Connecting,
		ConnectionEvent::Connected,
		ConnectionEvent::Disconnected,
		ConnectionEvent::Closing,
		ConnectionEvent::Closed,
		ConnectionEvent::Failed,
		ConnectionEvent::Suspended,
		ConnectionEvent::Update,
		ConnectionEvent::TransportPending,
	] {
		let tx = tx.clone();
		connection.on(event, move |change| {
			let _ = tx.send(change.clone());
		});
	}
	rx
}
