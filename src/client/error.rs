use rumqttc::{ClientError, ConnectReturnCode};

use super::config::ConfigError;

/// Failures of the CONNECT/CONNACK bootstrap exchange.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionEstablishmentError {
	#[error("Network connection failed: {0}")]
	Network(#[from] rumqttc::ConnectionError),

	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected { code: ConnectReturnCode },

	#[error("Connection establishment timed out after {timeout_millis}ms")]
	Timeout { timeout_millis: u64 },
}

/// Errors raised by the transport client
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
	/// Invalid configuration, detected before connecting
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	/// Connection could not be established
	#[error("Failed to establish connection: {0}")]
	ConnectionEstablishment(#[from] ConnectionEstablishmentError),

	/// Request could not be queued to the event loop
	#[error("Client operation failed: {0}")]
	ClientOperation(#[from] ClientError),

	/// `connect()` called on a client that already has a live session
	#[error("Client is already connected or reconnecting")]
	AlreadyConnected,
}

impl TransportError {
	/// True when the broker refused the connection.
	pub fn is_rejected(&self) -> bool {
		matches!(
			self,
			TransportError::ConnectionEstablishment(
				ConnectionEstablishmentError::BrokerRejected { .. }
			)
		)
	}
}
