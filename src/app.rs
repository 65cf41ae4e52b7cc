//! Device application
//!
//! Ties a player to the broker: player commands on the commands topic,
//! connection status, and throttled status telemetry.

pub mod commands;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

pub use commands::{PLAYER_COMMANDS, register_player_commands};

use crate::client::{BrokerConfig, Transport, TransportClient, TransportError};
use crate::player::Player;
use crate::routing::{CommandRouter, RouterError};
use crate::status::StatusPublisher;

/// A player exposed on the device topics.
///
/// Owns the command router (with every player command registered), the
/// player and the status publisher. Status updates, when enabled, start on
/// every established connection between [`connect`](Self::connect) and
/// [`disconnect`](Self::disconnect), including one made by a background
/// reconnect after a failed first attempt.
pub struct DeviceApp<T: Transport = TransportClient> {
	router: CommandRouter<T>,
	player: Arc<dyn Player>,
	status: Arc<StatusPublisher<T>>,
	active: Arc<AtomicBool>,
}

impl DeviceApp<TransportClient> {
	/// Creates an application with a `rumqttc` transport.
	///
	/// Status publisher tuning comes from the `status_updater` section of
	/// the configuration's raw document.
	pub fn new(config: BrokerConfig, player: Arc<dyn Player>) -> Result<Self, RouterError> {
		Self::with_router(CommandRouter::new(config)?, player)
	}
}

impl<T: Transport> DeviceApp<T> {
	pub fn with_router(
		router: CommandRouter<T>,
		player: Arc<dyn Player>,
	) -> Result<Self, RouterError> {
		let status = Arc::new(StatusPublisher::from_router(
			router.clone(),
			Arc::clone(&player),
		)?);
		register_player_commands(&router, Arc::clone(&player));
		let active = Arc::new(AtomicBool::new(false));

		if status.config().enabled {
			let publisher = Arc::downgrade(&status);
			let app_active = Arc::clone(&active);
			router.transport().on_connect(move |connected| {
				if !connected || !app_active.load(Ordering::SeqCst) {
					return;
				}
				if let Some(publisher) = publisher.upgrade() {
					if !publisher.is_running() {
						publisher.start();
					}
				}
			});
		}

		Ok(Self {
			router,
			player,
			status,
			active,
		})
	}

	/// Connects to the broker. Status updates start with the connection
	/// when they are enabled.
	pub async fn connect(&self) -> Result<(), TransportError> {
		if !self.status.config().enabled {
			info!("Status updates are disabled in configuration");
		}
		self.active.store(true, Ordering::SeqCst);
		self.router.connect().await
	}

	/// Stops status updates, then disconnects from the broker.
	pub async fn disconnect(&self) {
		self.active.store(false, Ordering::SeqCst);
		self.status.stop().await;
		self.router.disconnect().await;
	}

	/// Publishes the current full player state.
	pub fn publish_player_state(&self) -> bool {
		match self.player.get_status() {
			| Ok(status) => self.router.publish_state(status),
			| Err(err) => {
				warn!(error = %err, "Failed to read player state");
				false
			}
		}
	}

	pub fn router(&self) -> &CommandRouter<T> {
		&self.router
	}

	pub fn player(&self) -> &Arc<dyn Player> {
		&self.player
	}

	pub fn status_publisher(&self) -> &StatusPublisher<T> {
		&self.status
	}
}
