use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::config::ConnectionManagerOptions;
use crate::connectivity::ConnectivityCheck;
use crate::error::{Error, ErrorDetails};
use crate::event_emitter::{EventEmitter, HandlerId};
use crate::pending::PendingSlot;
use crate::protocol::{Action, ConnectionDetails, ProtocolMessage};
use crate::state_machine::{ConnectionEvent, ConnectionState, ConnectionStateChange, StateMachine};
use crate::timer_fabric::{FabricEvent, TimerFabric};
use crate::transport::{Transport, TransportError, TransportListener};

/// Receives any protocol message carrying a `channel` field.
/// The manager's sole hand-off point to the rest of the client; a real
/// embedding application routes this into channel attach/detach/presence
/// logic that is out of scope here.
pub trait ChannelDispatch: Send + Sync {
	fn on_channel_message(&self, msg: ProtocolMessage);
}

/// Default dispatcher for standalone use and tests.
#[derive(Debug, Default)]
pub struct NoopChannelDispatch;

impl ChannelDispatch for NoopChannelDispatch {
	fn on_channel_message(&self, msg: ProtocolMessage) {
		tracing::trace!(channel = ?msg.channel, "dropped channel message: no dispatcher configured");
	}
}

/// Builds a fresh `Transport` for each connect attempt. A factory rather
/// than a single shared instance because a transport is never reused after
/// disposal — the manager always disposes the old one before any new
/// instance is created; injecting construction lets tests swap in a
/// scripted mock transport without the manager knowing about WebSockets at
/// all.
pub type TransportFactory = Arc<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

struct PingState {
	id: Option<String>,
	started: Option<Instant>,
}

struct Inner {
	state_machine: StateMachine,
	timer_fabric: TimerFabric,
	pending_connected: PendingSlot<()>,
	pending_closed: PendingSlot<()>,
	pending_ping: PendingSlot<f64>,
	ping_state: PingState,
	transport: Option<Arc<dyn Transport>>,
	connection_details: Option<ConnectionDetails>,
	error_reason: Option<Error>,
}

/// The orchestrator tying the state machine, timer fabric, pending results
/// and event emitter together behind a plain `std::sync::Mutex` — the lock
/// is only ever held across synchronous bookkeeping, never across an
/// `await`.
pub struct ConnectionManager {
	inner: Mutex<Inner>,
	events: EventEmitter<ConnectionEvent, ConnectionStateChange>,
	options: ConnectionManagerOptions,
	connectivity: Arc<dyn ConnectivityCheck>,
	transport_factory: TransportFactory,
	dispatch: Arc<dyn ChannelDispatch>,
}

impl ConnectionManager {
	#[must_use]
	pub fn new(options: ConnectionManagerOptions, transport_factory: TransportFactory, dispatch: Arc<dyn ChannelDispatch>, connectivity: Arc<dyn ConnectivityCheck>) -> Arc<Self> {
		let (fabric_tx, mut fabric_rx) = mpsc::unbounded_channel();
		let auto_connect = options.auto_connect;

		let inner = Inner {
			state_machine: StateMachine::new(ConnectionState::Initialized),
			timer_fabric: TimerFabric::new(&options, fabric_tx),
			pending_connected: PendingSlot::new(),
			pending_closed: PendingSlot::new(),
			pending_ping: PendingSlot::new(),
			ping_state: PingState { id: None, started: None },
			transport: None,
			connection_details: None,
			error_reason: None,
		};

		let manager = Arc::new(Self {
			inner: Mutex::new(inner),
			events: EventEmitter::new(),
			options,
			connectivity,
			transport_factory,
			dispatch,
		});

		let fabric_manager = Arc::clone(&manager);
		tokio::spawn(async move {
			while let Some(event) = fabric_rx.recv().await {
				fabric_manager.handle_fabric_event(event).await;
			}
		});

		if auto_connect {
			// Enact the Connecting transition synchronously so the manager's
			// initial state really is CONNECTING by the time `new` returns
			// and drive the rest of the attempt in the background.
			let rx = manager.start_connect_attempt();
			let auto = Arc::clone(&manager);
			tokio::spawn(async move {
				let _ = auto.drive_connect_attempt(rx).await;
			});
		}

		manager
	}

	#[must_use]
	pub fn state(&self) -> ConnectionState {
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).state_machine.current()
	}

	#[must_use]
	pub fn error_reason(&self) -> Option<Error> {
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).error_reason.clone()
	}

	#[must_use]
	pub fn connection_details(&self) -> Option<ConnectionDetails> {
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).connection_details.clone()
	}

	pub fn on<F>(&self, event: ConnectionEvent, handler: F) -> HandlerId
	where
		F: FnMut(&ConnectionStateChange) + Send + 'static,
	{
		self.events.on(event, handler)
	}

	pub fn once<F>(&self, event: ConnectionEvent, handler: F) -> HandlerId
	where
		F: FnMut(&ConnectionStateChange) + Send + 'static,
	{
		self.events.once(event, handler)
	}

	pub fn off(&self, event: ConnectionEvent, id: HandlerId) {
		self.events.off(&event, id);
	}

	/// Idempotent: returns immediately if already connected, joins an
	/// in-flight attempt if one is running.
	pub async fn connect(self: &Arc<Self>) -> Result<(), Error> {
		match self.state() {
			ConnectionState::Connected => return Ok(()),
			ConnectionState::Connecting => {
				let joined = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_connected.join();
				return match joined {
					Some(rx) => rx.await.unwrap_or_else(|_| Err(Error::cancelled())),
					None => Ok(()),
				};
			}
			_ => {}
		}

		let rx = self.start_connect_attempt();
		self.drive_connect_attempt(rx).await
	}

	fn start_connect_attempt(self: &Arc<Self>) -> oneshot::Receiver<Result<(), Error>> {
		let rx = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_connected.arm();
		self.emit_transport_pending();
		self.enact(ConnectionState::Connecting, None);
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).timer_fabric.arm_transition_timer();
		rx
	}

	/// Fired right before the `Connecting` transition, ahead of building the
	/// transport for this attempt.
	fn emit_transport_pending(self: &Arc<Self>) {
		let current = self.state();
		let change = ConnectionStateChange {
			previous: current,
			current,
			event: ConnectionEvent::TransportPending,
			reason: None,
		};
		self.events.emit(&change.event, &change);
	}

	async fn drive_connect_attempt(self: &Arc<Self>, rx: oneshot::Receiver<Result<(), Error>>) -> Result<(), Error> {
		let transport = (self.transport_factory)();
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).transport = Some(Arc::clone(&transport));

		let listener: Arc<dyn TransportListener> = Arc::new(ListenerBridge { manager: Arc::clone(self) });
		if let Err(err) = transport.connect(listener).await {
			let error = Error::server_fatal(ErrorDetails {
				message: err.to_string(),
				status_code: 502,
				code: 50_000,
				nonfatal: true,
			});
			self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_connected.settle(Err(error.clone()));
			self.dispose_transport().await;
			self.enact(ConnectionState::Disconnected, Some(error.clone()));
			self.enter_retry_path();
			return Err(error);
		}

		rx.await.unwrap_or_else(|_| Err(Error::cancelled()))
	}

	/// Fast-paths terminal states, awaits an in-flight
	/// connect first, and otherwise tears down through `CLOSING`.
	pub async fn close(self: &Arc<Self>) {
		if matches!(self.state(), ConnectionState::Connecting) {
			let _ = self.connect().await;
		}

		match self.state() {
			ConnectionState::Closed => return,
			ConnectionState::Initialized | ConnectionState::Failed => {
				self.enact(ConnectionState::Closed, None);
				return;
			}
			_ => {}
		}

		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).timer_fabric.cancel_all();
		let transport = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).transport.clone();

		if matches!(self.state(), ConnectionState::Connected) {
			let rx = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_closed.arm();
			self.enact(ConnectionState::Closing, None);
			if let Some(transport) = &transport {
				let _ = transport.close().await;
			}
			let timeout = self.options.realtime_request_timeout;
			let reason = match tokio::time::timeout(timeout, rx).await {
				Ok(_) => None,
				Err(_) => Some(Error::timeout("close", timeout)),
			};
			self.dispose_transport().await;
			self.enact(ConnectionState::Closed, reason);
		} else {
			self.dispose_transport().await;
			self.enact(ConnectionState::Closed, None);
		}
	}

	/// Permitted only in `{Connected, Connecting}`.
	pub async fn ping(self: &Arc<Self>) -> Result<f64, Error> {
		match self.state() {
			ConnectionState::Connected | ConnectionState::Connecting => {}
			other => return Err(Error::invalid_state("ping", other.as_str())),
		}

		let existing = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_ping.join();
		let rx = if let Some(rx) = existing {
			rx
		} else {
			let transport = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).transport.clone();
			let Some(transport) = transport else {
				return Err(Error::invalid_state("ping", "no transport"));
			};

			let id = uuid::Uuid::new_v4().to_string();
			let rx = {
				let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
				inner.ping_state.id = Some(id.clone());
				inner.ping_state.started = Some(Instant::now());
				inner.pending_ping.arm()
			};

			if let Err(err) = transport.send(ProtocolMessage::heartbeat(id)).await {
				tracing::debug!(%err, "failed to send heartbeat frame");
				self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_ping.clear();
				return Err(Error::invalid_state("ping", "transport send failed"));
			}
			rx
		};

		let timeout = self.options.realtime_request_timeout;
		match tokio::time::timeout(timeout, rx).await {
			Ok(result) => result.unwrap_or_else(|_| Err(Error::cancelled())),
			Err(_) => {
				self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_ping.clear();
				Err(Error::timeout("ping", timeout))
			}
		}
	}

	async fn handle_fabric_event(self: &Arc<Self>, event: FabricEvent) {
		match event {
			FabricEvent::TransitionTimedOut => self.on_transition_timeout().await,
			FabricEvent::SuspendExpired => self.on_suspend_expired().await,
			FabricEvent::RetryFired => self.on_retry_fired().await,
		}
	}

	async fn on_transition_timeout(self: &Arc<Self>) {
		if !matches!(self.state(), ConnectionState::Connecting) {
			return;
		}
		self.dispose_transport().await;
		let err = Error::timeout("connect", self.options.realtime_request_timeout);
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_connected.settle(Err(err.clone()));
		self.enact(ConnectionState::Disconnected, Some(err));
		self.enter_retry_path();
	}

	async fn on_suspend_expired(self: &Arc<Self>) {
		if matches!(self.state(), ConnectionState::Closed | ConnectionState::Closing | ConnectionState::Failed | ConnectionState::Connected) {
			return;
		}
		{
			let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
			inner.timer_fabric.set_fail_state(ConnectionState::Suspended);
			inner.timer_fabric.clear_connection_state_ttl_override();
			inner.connection_details = None;
		}
		self.enact(ConnectionState::Suspended, Some(Error::suspended_ttl()));
		self.enter_retry_path();
	}

	async fn on_retry_fired(self: &Arc<Self>) {
		let state = self.state();
		if !matches!(state, ConnectionState::Disconnected | ConnectionState::Suspended) {
			return;
		}
		if !self.connectivity.check().await {
			tracing::debug!(%state, "connectivity probe failed; re-arming retry");
			let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
			inner.error_reason = Some(Error::unreachable());
			inner.timer_fabric.arm_retry_timer(state);
			return;
		}
		let manager = Arc::clone(self);
		tokio::spawn(async move {
			let _ = manager.connect().await;
		});
	}

	fn enter_retry_path(self: &Arc<Self>) {
		let state = self.state();
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).timer_fabric.arm_retry_timer(state);
	}

	async fn dispose_transport(self: &Arc<Self>) {
		let transport = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).transport.take();
		if let Some(transport) = transport {
			transport.dispose().await;
		}
	}

	/// Mutates state, keeps the timer fabric and ping slot invariants in
	/// sync, and emits the resulting `ConnectionStateChange`. Every state
	/// transition in this module funnels through here so those invariants
	/// can't be forgotten at a call site.
	fn enact(self: &Arc<Self>, new_state: ConnectionState, reason: Option<Error>) -> ConnectionStateChange {
		let change = {
			let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
			inner.error_reason = reason.clone();
			let change = inner.state_machine.enact_state_change(new_state, reason.clone());

			if matches!(new_state, ConnectionState::Connecting | ConnectionState::Disconnected | ConnectionState::Suspended) {
				inner.timer_fabric.arm_suspend_timer_if_absent();
			} else {
				inner.timer_fabric.cancel_suspend_timer();
			}
			if !matches!(new_state, ConnectionState::Connecting) {
				inner.timer_fabric.cancel_transition_timer();
			}
			if !matches!(new_state, ConnectionState::Disconnected | ConnectionState::Suspended) {
				inner.timer_fabric.cancel_retry_timer();
			}
			if !matches!(new_state, ConnectionState::Connected | ConnectionState::Connecting) {
				let ping_err = reason.clone().unwrap_or_else(Error::cancelled);
				inner.pending_ping.settle(Err(ping_err));
				inner.ping_state.id = None;
				inner.ping_state.started = None;
			}

			change
		};
		self.events.emit(&change.event, &change);
		change
	}

	async fn on_protocol_message(self: &Arc<Self>, msg: ProtocolMessage) {
		if Action::Connected.matches(msg.action) {
			self.on_connected(msg.connection_details).await;
		} else if Action::Error.matches(msg.action) {
			self.on_error_frame(msg).await;
		} else if Action::Closed.matches(msg.action) {
			self.on_closed().await;
		} else if Action::Heartbeat.matches(msg.action) {
			if let Some(id) = msg.id.clone() {
				self.on_heartbeat(id).await;
			}
		} else if msg.channel.is_some() {
			self.dispatch.on_channel_message(msg);
		} else {
			tracing::debug!(action = msg.action, "unhandled protocol action");
		}
	}

	async fn on_connected(self: &Arc<Self>, details: Option<ConnectionDetails>) {
		let was_connected = matches!(self.state(), ConnectionState::Connected);
		{
			let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
			inner.timer_fabric.cancel_suspend_timer();
			inner.timer_fabric.cancel_transition_timer();
			inner.timer_fabric.reset_fail_state();
			if let Some(details) = &details {
				inner.timer_fabric.apply_connection_state_ttl_override(details.connection_state_ttl_ms);
			}
			inner.connection_details = details;
			inner.pending_connected.settle(Ok(()));
		}

		if was_connected {
			let change = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).state_machine.emit_update(None);
			self.events.emit(&change.event, &change);
		} else {
			self.enact(ConnectionState::Connected, None);
		}
	}

	async fn on_error_frame(self: &Arc<Self>, msg: ProtocolMessage) {
		if msg.channel.is_some() {
			self.dispatch.on_channel_message(msg);
			return;
		}

		let details: ErrorDetails = msg.error.map(Into::into).unwrap_or_else(|| ErrorDetails {
			message: "connection-level error with no detail".into(),
			status_code: 500,
			code: 50_000,
			nonfatal: false,
		});
		let nonfatal = details.nonfatal;
		let err = Error::server_fatal(details);

		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_connected.settle(Err(err.clone()));
		self.dispose_transport().await;

		if nonfatal {
			self.enact(ConnectionState::Disconnected, Some(err));
			self.enter_retry_path();
		} else {
			self.enact(ConnectionState::Failed, Some(err));
		}
	}

	async fn on_closed(self: &Arc<Self>) {
		self.dispose_transport().await;
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_closed.settle(Ok(()));
	}

	async fn on_heartbeat(self: &Arc<Self>, id: String) {
		let latency = {
			let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
			if inner.ping_state.id.as_deref() == Some(id.as_str()) {
				let started = inner.ping_state.started.take();
				inner.ping_state.id = None;
				started.map(|start| (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0)
			} else {
				None
			}
		};
		if let Some(latency) = latency {
			self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_ping.settle(Ok(latency));
		}
	}

	async fn on_transport_failed(self: &Arc<Self>, error: TransportError) {
		let err = Error::server_fatal(ErrorDetails {
			message: error.to_string(),
			status_code: 502,
			code: 50_000,
			nonfatal: false,
		});
		self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pending_connected.settle(Err(err.clone()));
		self.dispose_transport().await;
		self.enact(ConnectionState::Failed, Some(err));
	}

	async fn on_transport_disconnected(self: &Arc<Self>, error: Option<TransportError>) {
		if matches!(self.state(), ConnectionState::Closed | ConnectionState::Failed | ConnectionState::Closing) {
			return;
		}
		self.dispose_transport().await;
		let reason = error.map(|err| {
			Error::server_fatal(ErrorDetails {
				message: err.to_string(),
				status_code: 502,
				code: 50_000,
				nonfatal: true,
			})
		});
		self.enact(ConnectionState::Disconnected, reason);
		self.enter_retry_path();
	}
}

struct ListenerBridge {
	manager: Arc<ConnectionManager>,
}

#[async_trait]
impl TransportListener for ListenerBridge {
	async fn on_protocol_message(&self, msg: ProtocolMessage) {
		self.manager.on_protocol_message(msg).await;
	}

	async fn on_failed(&self, error: TransportError) {
		self.manager.on_transport_failed(error).await;
	}

	async fn on_disconnected(&self, error: Option<TransportError>) {
		self.manager.on_transport_disconnected(error).await;
	}
}
