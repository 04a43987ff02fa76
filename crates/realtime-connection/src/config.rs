use std::time::Duration;

use crate::connectivity::DEFAULT_CONNECTIVITY_CHECK_URL;

/// Tunables the connection manager reads, constructed directly by the
/// embedding application with no env/file loading layer in front of it.
#[derive(Debug, Clone)]
pub struct ConnectionManagerOptions {
	/// If true, initial state is `Connecting` and `connect()` is driven
	/// implicitly on construction.
	pub auto_connect: bool,
	/// Connect/close/ping/transition timer delay.
	pub realtime_request_timeout: Duration,
	/// Suspend-timer delay; overridden by server `connectionDetails.connectionStateTtl`.
	pub connection_state_ttl: Duration,
	/// Retry delay while in `Disconnected`.
	pub disconnected_retry_timeout: Duration,
	/// Retry delay while in `Suspended`.
	pub suspended_retry_timeout: Duration,
	/// Endpoint for the connectivity probe.
	pub connectivity_check_url: String,
}

impl Default for ConnectionManagerOptions {
	fn default() -> Self {
		Self {
			auto_connect: true,
			realtime_request_timeout: Duration::from_secs(10),
			connection_state_ttl: Duration::from_secs(120),
			disconnected_retry_timeout: Duration::from_secs(15),
			suspended_retry_timeout: Duration::from_secs(30),
			connectivity_check_url: DEFAULT_CONNECTIVITY_CHECK_URL.to_string(),
		}
	}
}
