//! Online/offline status messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{MessageKind, WireMessage, now_timestamp};

/// Reachability of the device as seen by other subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
	Online,
	#[default]
	Offline,
}

impl fmt::Display for ConnectionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			| ConnectionStatus::Online => "online",
			| ConnectionStatus::Offline => "offline",
		})
	}
}

/// Retained message on the connection topic, also used as the last will.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMessage {
	#[serde(default)]
	pub status: ConnectionStatus,
	#[serde(default = "now_timestamp")]
	pub timestamp: f64,
}

impl ConnectionMessage {
	/// Creates a status message stamped with the current time.
	pub fn new(status: ConnectionStatus) -> Self {
		Self {
			status,
			timestamp: now_timestamp(),
		}
	}

	pub fn online() -> Self {
		Self::new(ConnectionStatus::Online)
	}

	pub fn offline() -> Self {
		Self::new(ConnectionStatus::Offline)
	}
}

impl Default for ConnectionMessage {
	fn default() -> Self {
		Self::offline()
	}
}

impl WireMessage for ConnectionMessage {
	const KIND: MessageKind = MessageKind::Connection;
}
