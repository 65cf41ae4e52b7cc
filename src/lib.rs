//! # Device Link
//!
//! Device-side MQTT link for a remotely controlled media player: command and
//! response routing, connection status with a last will, and throttled
//! player status telemetry.
//!
//! ## Features
//!
//! - **Device namespace**: every topic is `{prefix}/{device_id}/{kind}` with
//!   kind `state`, `commands`, `responses` or `connection`
//! - **Command routing**: each inbound command gets exactly one response,
//!   correlated by `command_id`
//! - **Connection status**: `online` on connect, `offline` through the last
//!   will or on a graceful disconnect, both retained
//! - **Reconnection**: exponential backoff from 1s up to a configurable cap
//! - **Status telemetry**: full snapshots on change or every few seconds,
//!   cheap position-only updates while playing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use device_link::{BrokerConfig, DeviceApp, Player, PlayerError, PlayerStatus};
//!
//! struct Speaker;
//!
//! impl Player for Speaker {
//!     fn get_status(&self) -> Result<PlayerStatus, PlayerError> {
//!         Ok(PlayerStatus::default())
//!     }
//!
//!     fn play(&self) -> Result<(), PlayerError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BrokerConfig::from_value(&serde_json::json!({
//!         "broker": {"broker_url": "mqtt.example.com", "port": 8883},
//!         "device": {"id": "living-room"},
//!         "status_updater": {"full_update_interval": 10.0}
//!     }))?;
//!
//!     let app = DeviceApp::new(config, Arc::new(Speaker))?;
//!     app.connect().await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     app.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom commands
//!
//! The router accepts any handler returning a JSON value; the value is
//! echoed in the response as `data.result`, and `false` marks a failed
//! result:
//!
//! ```rust,no_run
//! use device_link::{BrokerConfig, CommandRouter, HandlerError};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = CommandRouter::new(BrokerConfig::new("mqtt.example.com", "kitchen"))?;
//! router.register_command_handler("echo", |params| {
//!     params
//!         .get("text")
//!         .cloned()
//!         .ok_or_else(|| HandlerError::missing("text"))
//! });
//! router.register_command_handler("ping", |_| Ok(json!("pong")));
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod client;
pub mod connection;
pub mod message;
pub mod message_serializer;
pub mod player;
pub mod routing;
pub mod status;
pub mod topic;

// === Core Public API ===
pub use app::{DeviceApp, register_player_commands};
pub use client::{BrokerConfig, ConnectionOptions, Transport, TransportClient};
pub use connection::ConnectionState;
pub use player::{Player, PlayerError, PlayerStatus};
pub use routing::{CommandRouter, HandlerError, HandlerResult};
pub use status::{StatusPublisher, StatusPublisherConfig};

// Messages
pub use message::{
	CommandMessage, CommandParams, ConnectionMessage, ConnectionStatus, Message,
	MessageKind, PlaybackState, ResponseMessage, SongInfo, StateMessage,
	WireMessage,
};
pub use message_serializer::{JsonSerializer, MessageSerializer};

// Topics
pub use topic::{TopicKind, TopicNamespace};

// Essential external types
pub use rumqttc::QoS;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, client::TransportError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use device_link::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most device applications

	pub use crate::{
		BrokerConfig, CommandMessage, CommandRouter, DeviceApp, HandlerError,
		HandlerResult, Player, PlayerError, PlayerStatus, QoS, ResponseMessage,
		Result, StateMessage, Transport,
	};
}

/// Advanced types for custom transports and lower-level control
///
/// ```rust
/// use device_link::advanced::*;
/// ```
pub mod advanced {
	//! Building blocks below the router

	pub use crate::client::{
		Backoff, ClientSettings, InboundMessage, LastWill, Payload,
		qos_from_level, qos_level,
	};
	pub use crate::routing::{
		CommandHandler, CommandRegistry, MessageCallback, ObserverList,
		SubscriptionTable, WeakCommandRouter,
	};
	pub use crate::status::{StatusThrottle, UpdateDecision};
	pub use crate::topic::{TopicPattern, TopicPatternItem, matches};
}

/// Error types used throughout the library
///
/// ```rust
/// use device_link::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::client::{ConfigError, ConnectionEstablishmentError, TransportError};
	pub use crate::message::CodecError;
	pub use crate::player::PlayerError;
	pub use crate::routing::{HandlerError, RouterError};
	pub use crate::topic::{TopicError, TopicPatternError};
}
