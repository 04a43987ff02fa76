use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Details carried by a server-originated error frame or a locally
/// synthesized one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
	pub message: String,
	pub status_code: u16,
	pub code: u32,
	pub nonfatal: bool,
}

impl fmt::Display for ErrorDetails {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} (status {}, code {})", self.message, self.status_code, self.code)
	}
}

/// The error taxonomy the connection manager surfaces.
#[derive(Debug, Clone, Error)]
pub enum Error {
	#[error("{operation} timed out after {duration:?}")]
	Timeout { operation: &'static str, duration: Duration },

	#[error("connectivity check failed, endpoint unreachable")]
	Unreachable,

	#[error("connection state ttl exceeded: {0}")]
	SuspendedTtl(ErrorDetails),

	#[error("server error: {0}")]
	ServerFatal(ErrorDetails),

	#[error("{operation} is not permitted while connection is {state}")]
	InvalidState { operation: &'static str, state: &'static str },

	#[error("operation cancelled")]
	Cancelled,
}

impl Error {
	#[must_use]
	pub fn timeout(operation: &'static str, duration: Duration) -> Self {
		Self::Timeout { operation, duration }
	}

	#[must_use]
	pub fn unreachable() -> Self {
		Self::Unreachable
	}

	#[must_use]
	pub fn suspended_ttl() -> Self {
		Self::SuspendedTtl(ErrorDetails {
			message: "connection state ttl expired while disconnected".into(),
			status_code: 504,
			code: 80_002,
			nonfatal: true,
		})
	}

	#[must_use]
	pub fn server_fatal(details: ErrorDetails) -> Self {
		Self::ServerFatal(details)
	}

	#[must_use]
	pub const fn invalid_state(operation: &'static str, state: &'static str) -> Self {
		Self::InvalidState { operation, state }
	}

	#[must_use]
	pub const fn cancelled() -> Self {
		Self::Cancelled
	}

	/// Application-level error code assigned to each kind.
	#[must_use]
	pub fn app_code(&self) -> u32 {
		match self {
			Self::Timeout { .. } | Self::Cancelled => 50_003,
			Self::Unreachable => 80_003,
			Self::SuspendedTtl(details) | Self::ServerFatal(details) => details.code,
			Self::InvalidState { .. } => 40_000,
		}
	}

	/// `ServerFatal` is only fatal when the server-supplied `nonfatal` flag
	/// says so.
	#[must_use]
	pub const fn is_fatal(&self) -> bool {
		match self {
			Self::ServerFatal(details) => !details.nonfatal,
			Self::InvalidState { .. } => true,
			_ => false,
		}
	}
}
