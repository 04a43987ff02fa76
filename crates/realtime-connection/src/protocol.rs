use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorDetails;

/// Protocol message action codes the core observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Action {
	Heartbeat = 0,
	Connected = 4,
	Close = 7,
	Closed = 8,
	Error = 9,
}

impl Action {
	#[must_use]
	pub const fn matches(self, action: i32) -> bool {
		action == self as i32
	}
}

/// A server-supplied record of interest to the core. Unrecognized fields are
/// kept in `extra` but never interpreted — the core stores opaque
/// `ConnectionDetails` fields without acting on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionDetails {
	#[serde(rename = "connectionStateTtl", skip_serializing_if = "Option::is_none")]
	pub connection_state_ttl_ms: Option<u64>,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

/// Wire representation of `Error`/`ErrorDetails` as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
	pub message: String,
	#[serde(rename = "statusCode")]
	pub status_code: u16,
	pub code: u32,
	#[serde(default)]
	pub nonfatal: bool,
}

impl From<WireError> for ErrorDetails {
	fn from(value: WireError) -> Self {
		Self {
			message: value.message,
			status_code: value.status_code,
			code: value.code,
			nonfatal: value.nonfatal,
		}
	}
}

/// A structured frame exchanged over the transport. Carries at minimum
/// `action`; every other field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMessage {
	pub action: i32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<WireError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub channel: Option<String>,
	#[serde(rename = "connectionDetails", skip_serializing_if = "Option::is_none")]
	pub connection_details: Option<ConnectionDetails>,
	#[serde(rename = "connectionSerial", skip_serializing_if = "Option::is_none")]
	pub connection_serial: Option<i64>,
	#[serde(rename = "msgSerial", skip_serializing_if = "Option::is_none")]
	pub msg_serial: Option<i64>,
}

impl ProtocolMessage {
	#[must_use]
	pub fn heartbeat(id: impl Into<String>) -> Self {
		Self {
			action: Action::Heartbeat as i32,
			id: Some(id.into()),
			error: None,
			channel: None,
			connection_details: None,
			connection_serial: None,
			msg_serial: None,
		}
	}

	#[must_use]
	pub fn close() -> Self {
		Self {
			action: Action::Close as i32,
			id: None,
			error: None,
			channel: None,
			connection_details: None,
			connection_serial: None,
			msg_serial: None,
		}
	}

	#[must_use]
	pub fn is_connection_scoped(&self) -> bool {
		self.channel.is_none()
	}
}
