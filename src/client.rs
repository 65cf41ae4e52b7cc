//! MQTT transport client
//!
//! This module provides the broker connection: configuration, payload
//! encoding, the last will and the [`TransportClient`] with its reconnect
//! backoff.

pub mod backoff;
pub mod config;
/// Client error types
pub mod error;
#[cfg(test)]
pub(crate) mod fake_broker;
pub mod last_will;
pub mod payload;
/// Transport trait and its `rumqttc` implementation
pub mod transport;

pub use backoff::Backoff;
pub use config::{
	BrokerConfig, ClientSettings, ConfigError, ConnectionOptions, qos_from_level,
	qos_level,
};
pub use error::{ConnectionEstablishmentError, TransportError};
pub use last_will::LastWill;
pub use payload::{InboundMessage, Payload};
pub use transport::{Transport, TransportClient};

// Connection state is available from the root level
// Use: device_link::ConnectionState
