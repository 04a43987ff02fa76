use std::sync::Arc;

use crate::config::ConnectionManagerOptions;
use crate::connectivity::{ConnectivityCheck, ConnectivityProbe};
use crate::error::Error;
use crate::event_emitter::HandlerId;
use crate::manager::{ChannelDispatch, ConnectionManager, NoopChannelDispatch, TransportFactory};
use crate::protocol::ConnectionDetails;
use crate::state_machine::{ConnectionEvent, ConnectionState, ConnectionStateChange};
use crate::transport::WebSocketTransport;

/// Thin user-facing facade over `ConnectionManager`, exposing state,
/// `error_reason`, `connection_details`, the `connect`/`close`/`ping`
/// operations, and event subscription, while the manager does the work.
#[derive(Clone)]
pub struct Connection {
	manager: Arc<ConnectionManager>,
}

impl Connection {
	/// Convenience constructor wiring the production `WebSocketTransport`
	/// against `endpoint_url`, with no channel dispatcher configured.
	#[must_use]
	pub fn new(endpoint_url: impl Into<String>, options: ConnectionManagerOptions) -> Self {
		Self::with_dispatch(endpoint_url, options, Arc::new(NoopChannelDispatch))
	}

	#[must_use]
	pub fn with_dispatch(endpoint_url: impl Into<String>, options: ConnectionManagerOptions, dispatch: Arc<dyn ChannelDispatch>) -> Self {
		let url = endpoint_url.into();
		let factory: TransportFactory = Arc::new(move || Arc::new(WebSocketTransport::new(url.clone())));
		let connectivity: Arc<dyn ConnectivityCheck> = Arc::new(ConnectivityProbe::new(options.connectivity_check_url.clone()));
		Self::with_collaborators(options, factory, dispatch, connectivity)
	}

	/// Convenience constructor for tests: a scripted mock transport, the
	/// default channel dispatcher and the real HTTP connectivity probe.
	#[must_use]
	pub fn with_transport_factory(options: ConnectionManagerOptions, transport_factory: TransportFactory, dispatch: Arc<dyn ChannelDispatch>) -> Self {
		let connectivity: Arc<dyn ConnectivityCheck> = Arc::new(ConnectivityProbe::new(options.connectivity_check_url.clone()));
		Self::with_collaborators(options, transport_factory, dispatch, connectivity)
	}

	/// Lowest-level constructor: every collaborator injected explicitly, so
	/// tests can swap in both a scripted mock transport and a scripted
	/// connectivity check without touching the network.
	#[must_use]
	pub fn with_collaborators(options: ConnectionManagerOptions, transport_factory: TransportFactory, dispatch: Arc<dyn ChannelDispatch>, connectivity: Arc<dyn ConnectivityCheck>) -> Self {
		Self {
			manager: ConnectionManager::new(options, transport_factory, dispatch, connectivity),
		}
	}

	#[must_use]
	pub fn state(&self) -> ConnectionState {
		self.manager.state()
	}

	#[must_use]
	pub fn error_reason(&self) -> Option<Error> {
		self.manager.error_reason()
	}

	#[must_use]
	pub fn connection_details(&self) -> Option<ConnectionDetails> {
		self.manager.connection_details()
	}

	pub async fn connect(&self) -> Result<(), Error> {
		self.manager.connect().await
	}

	pub async fn close(&self) {
		self.manager.close().await;
	}

	pub async fn ping(&self) -> Result<f64, Error> {
		self.manager.ping().await
	}

	pub fn on<F>(&self, event: ConnectionEvent, handler: F) -> HandlerId
	where
		F: FnMut(&ConnectionStateChange) + Send + 'static,
	{
		self.manager.on(event, handler)
	}

	pub fn once<F>(&self, event: ConnectionEvent, handler: F) -> HandlerId
	where
		F: FnMut(&ConnectionStateChange) + Send + 'static,
	{
		self.manager.once(event, handler)
	}

	pub fn off(&self, event: ConnectionEvent, id: HandlerId) {
		self.manager.off(event, id);
	}
}
