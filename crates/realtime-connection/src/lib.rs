pub mod config;
pub mod connection;
pub mod connectivity;
pub mod error;
pub mod event_emitter;
pub mod manager;
pub mod pending;
pub mod protocol;
pub mod state_machine;
pub mod timer;
pub mod timer_fabric;
pub mod transport;

pub use config::ConnectionManagerOptions;
pub use connection::Connection;
pub use connectivity::{ConnectivityCheck, ConnectivityProbe, DEFAULT_CONNECTIVITY_CHECK_URL};
pub use error::{Error, ErrorDetails};
pub use event_emitter::{EventEmitter, HandlerId};
pub use manager::{ChannelDispatch, ConnectionManager, NoopChannelDispatch, TransportFactory};
pub use protocol::{Action, ConnectionDetails, ProtocolMessage, WireError};
pub use state_machine::{ConnectionEvent, ConnectionState, ConnectionStateChange};
pub use transport::{Transport, TransportError, TransportListener, WebSocketTransport};
