use crate::error::Error;

/// The eight lifecycle states a connection can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	Initialized,
	Connecting,
	Connected,
	Disconnected,
	Closing,
	Closed,
	Failed,
	Suspended,
}

impl ConnectionState {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Initialized => "initialized",
			Self::Connecting => "connecting",
			Self::Connected => "connected",
			Self::Disconnected => "disconnected",
			Self::Closing => "closing",
			Self::Closed => "closed",
			Self::Failed => "failed",
			Self::Suspended => "suspended",
		}
	}
}

impl std::fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Superset of `ConnectionState` plus `Update` (a fresh `CONNECTED` frame
/// arriving without changing state) and `TransportPending` (a connect
/// attempt about to build its transport, fired just before `Connecting`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
	Initialized,
	Connecting,
	Connected,
	Disconnected,
	Closing,
	Closed,
	Failed,
	Suspended,
	Update,
	TransportPending,
}

impl From<ConnectionState> for ConnectionEvent {
	fn from(state: ConnectionState) -> Self {
		match state {
			ConnectionState::Initialized => Self::Initialized,
			ConnectionState::Connecting => Self::Connecting,
			ConnectionState::Connected => Self::Connected,
			ConnectionState::Disconnected => Self::Disconnected,
			ConnectionState::Closing => Self::Closing,
			ConnectionState::Closed => Self::Closed,
			ConnectionState::Failed => Self::Failed,
			ConnectionState::Suspended => Self::Suspended,
		}
	}
}

/// Emitted on every `connectionstate`/`update` occurrence.
#[derive(Debug, Clone)]
pub struct ConnectionStateChange {
	pub previous: ConnectionState,
	pub current: ConnectionState,
	pub event: ConnectionEvent,
	pub reason: Option<Error>,
}

/// Holds the current state and validates/executes transitions. No actor
/// wrapper: the embedding `ConnectionManager` already serializes access to
/// this struct behind its own lock, so `enact_state_change` just mutates in
/// place.
#[derive(Debug)]
pub struct StateMachine {
	current: ConnectionState,
}

impl StateMachine {
	#[must_use]
	pub const fn new(initial: ConnectionState) -> Self {
		Self { current: initial }
	}

	#[must_use]
	pub const fn current(&self) -> ConnectionState {
		self.current
	}

	/// Returns whether `to` is a permitted transition from `from`.
	/// `Closed`/`Failed` are terminal except for the user-driven restart
	/// back to `Connecting`.
	#[must_use]
	pub const fn is_permitted(from: ConnectionState, to: ConnectionState) -> bool {
		use ConnectionState::{Closed, Closing, Connected, Connecting, Disconnected, Failed, Initialized, Suspended};
		matches!(
			(from, to),
			(Initialized, Connecting)
				| (Connecting, Connected | Disconnected | Failed | Closing | Closed)
				| (Connected, Disconnected | Closing | Failed | Suspended)
				| (Disconnected, Connecting | Suspended | Closed)
				| (Suspended, Connecting | Closed)
				| (Closing, Closed | Failed)
				| (Closed, Connecting)
				| (Failed, Connecting)
		)
	}

	/// Records the previous state, assigns the new one, and returns the
	/// `ConnectionStateChange` the caller should emit. Callers are expected
	/// to have already checked `is_permitted` (the manager decides the
	/// target state from its own operation logic, so by the time this runs
	/// the transition is known good) — this method's job is strictly the
	/// state-change bookkeeping, not transition validation.
	pub fn enact_state_change(&mut self, new_state: ConnectionState, reason: Option<Error>) -> ConnectionStateChange {
		let previous = self.current;
		self.current = new_state;
		ConnectionStateChange {
			previous,
			current: new_state,
			event: ConnectionEvent::from(new_state),
			reason,
		}
	}

	/// Taken when a fresh `CONNECTED` frame arrives while already
	/// `Connected`. Never changes state.
	#[must_use]
	pub fn emit_update(&self, reason: Option<Error>) -> ConnectionStateChange {
		debug_assert_eq!(self.current, ConnectionState::Connected, "update is only emitted while already connected");
		ConnectionStateChange {
			previous: self.current,
			current: self.current,
			event: ConnectionEvent::Update,
			reason,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn initial_state_carries_through() {
		let sm = StateMachine::new(ConnectionState::Initialized);
		assert_eq!(sm.current(), ConnectionState::Initialized);
	}

	#[test]
	fn permitted_transitions_match_the_table() {
		assert!(StateMachine::is_permitted(ConnectionState::Initialized, ConnectionState::Connecting));
		assert!(StateMachine::is_permitted(ConnectionState::Connecting, ConnectionState::Connected));
		assert!(StateMachine::is_permitted(ConnectionState::Connected, ConnectionState::Suspended));
		assert!(StateMachine::is_permitted(ConnectionState::Disconnected, ConnectionState::Connecting));
		assert!(StateMachine::is_permitted(ConnectionState::Suspended, ConnectionState::Closed));
		assert!(StateMachine::is_permitted(ConnectionState::Closed, ConnectionState::Connecting));
		assert!(StateMachine::is_permitted(ConnectionState::Failed, ConnectionState::Connecting));
	}

	#[test]
	fn disallowed_transitions_are_rejected() {
		assert!(!StateMachine::is_permitted(ConnectionState::Initialized, ConnectionState::Connected));
		assert!(!StateMachine::is_permitted(ConnectionState::Closed, ConnectionState::Closing));
		assert!(!StateMachine::is_permitted(ConnectionState::Failed, ConnectionState::Disconnected));
	}

	#[test]
	fn enact_state_change_updates_current_and_reports_previous() {
		let mut sm = StateMachine::new(ConnectionState::Connecting);
		let change = sm.enact_state_change(ConnectionState::Connected, None);
		assert_eq!(change.previous, ConnectionState::Connecting);
		assert_eq!(change.current, ConnectionState::Connected);
		assert_eq!(sm.current(), ConnectionState::Connected);
		assert!(matches!(change.event, ConnectionEvent::Connected));
	}

	#[test]
	fn update_does_not_change_state() {
		let sm = StateMachine::new(ConnectionState::Connected);
		let change = sm.emit_update(None);
		assert_eq!(change.previous, ConnectionState::Connected);
		assert_eq!(change.current, ConnectionState::Connected);
		assert!(matches!(change.event, ConnectionEvent::Update));
		assert_eq!(sm.current(), ConnectionState::Connected);
	}

	#[test]
	fn previous_never_equals_current_unless_update() {
		let mut sm = StateMachine::new(ConnectionState::Initialized);
		let change = sm.enact_state_change(ConnectionState::Connecting, None);
		assert_ne!(change.previous, change.current);
	}
}
