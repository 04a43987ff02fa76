use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::ConnectionManagerOptions;
use crate::state_machine::ConnectionState;
use crate::timer::Timer;

/// A timer expiry, delivered to the manager's single event loop rather than
/// invoked as a direct callback into manager methods, so a timer firing can
/// never re-enter the manager while it already holds its own lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricEvent {
	TransitionTimedOut,
	SuspendExpired,
	RetryFired,
}

/// Owns the transition, suspend and retry timers, arming and cancelling
/// them at the manager's direction.
pub struct TimerFabric {
	events: mpsc::UnboundedSender<FabricEvent>,
	transition_timer: Option<Timer>,
	suspend_timer: Option<Timer>,
	retry_timer: Option<Timer>,
	fail_state: ConnectionState,
	connection_state_ttl: Duration,
	default_connection_state_ttl: Duration,
	realtime_request_timeout: Duration,
	disconnected_retry_timeout: Duration,
	suspended_retry_timeout: Duration,
}

impl TimerFabric {
	#[must_use]
	pub fn new(options: &ConnectionManagerOptions, events: mpsc::UnboundedSender<FabricEvent>) -> Self {
		Self {
			events,
			transition_timer: None,
			suspend_timer: None,
			retry_timer: None,
			fail_state: ConnectionState::Disconnected,
			connection_state_ttl: options.connection_state_ttl,
			default_connection_state_ttl: options.connection_state_ttl,
			realtime_request_timeout: options.realtime_request_timeout,
			disconnected_retry_timeout: options.disconnected_retry_timeout,
			suspended_retry_timeout: options.suspended_retry_timeout,
		}
	}

	#[must_use]
	pub const fn fail_state(&self) -> ConnectionState {
		self.fail_state
	}

	pub fn set_fail_state(&mut self, state: ConnectionState) {
		self.fail_state = state;
	}

	/// Reset on every successful `CONNECTED`.
	pub fn reset_fail_state(&mut self) {
		self.fail_state = ConnectionState::Disconnected;
	}

	/// Armed on entry to `Connecting`, delay = `realtimeRequestTimeout`.
	pub fn arm_transition_timer(&mut self) {
		let events = self.events.clone();
		self.transition_timer = Some(Timer::new(self.realtime_request_timeout, move || {
			let _ = events.send(FabricEvent::TransitionTimedOut);
		}));
	}

	pub fn cancel_transition_timer(&mut self) {
		if let Some(timer) = self.transition_timer.take() {
			timer.cancel();
		}
	}

	/// Armed at most once across the whole disconnected period; re-arming
	/// while already armed is a no-op.
	pub fn arm_suspend_timer_if_absent(&mut self) {
		if self.suspend_timer.is_some() {
			return;
		}
		let events = self.events.clone();
		self.suspend_timer = Some(Timer::new(self.connection_state_ttl, move || {
			let _ = events.send(FabricEvent::SuspendExpired);
		}));
	}

	pub fn cancel_suspend_timer(&mut self) {
		if let Some(timer) = self.suspend_timer.take() {
			timer.cancel();
		}
	}

	#[must_use]
	pub const fn is_suspend_timer_armed(&self) -> bool {
		self.suspend_timer.is_some()
	}

	/// Applies a server-supplied `connectionStateTtl` override, replacing
	/// the configured default for subsequent suspend-timer computations.
	/// Takes effect on the next `arm_suspend_timer_if_absent`.
	pub fn apply_connection_state_ttl_override(&mut self, ttl_ms: Option<u64>) {
		self.connection_state_ttl = ttl_ms.map_or(self.default_connection_state_ttl, Duration::from_millis);
	}

	/// Cleared when the suspend timer itself expires.
	pub fn clear_connection_state_ttl_override(&mut self) {
		self.connection_state_ttl = self.default_connection_state_ttl;
	}

	/// Armed on entry to `Disconnected` (`disconnectedRetryTimeout`) or
	/// `Suspended` (`suspendedRetryTimeout`).
	pub fn arm_retry_timer(&mut self, for_state: ConnectionState) {
		let delay = if matches!(for_state, ConnectionState::Suspended) {
			self.suspended_retry_timeout
		} else {
			self.disconnected_retry_timeout
		};
		let events = self.events.clone();
		self.retry_timer = Some(Timer::new(delay, move || {
			let _ = events.send(FabricEvent::RetryFired);
		}));
	}

	pub fn cancel_retry_timer(&mut self) {
		if let Some(timer) = self.retry_timer.take() {
			timer.cancel();
		}
	}

	pub fn cancel_all(&mut self) {
		self.cancel_transition_timer();
		self.cancel_suspend_timer();
		self.cancel_retry_timer();
	}
}
