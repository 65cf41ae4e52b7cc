use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::config::StatusPublisherConfig;
use super::throttle::{StatusThrottle, UpdateDecision};
use crate::client::{ConfigError, Payload, Transport, TransportClient};
use crate::player::{Player, PlayerError, PlayerStatus};
use crate::routing::CommandRouter;
use crate::routing::observers::panic_message;
use crate::topic::TopicKind;

/// How long [`StatusPublisher::stop`] waits for the polling task.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

struct Worker {
	cancel: CancellationToken,
	handle: JoinHandle<()>,
}

/// Polls the player and publishes its status through a command router.
///
/// Full updates go through [`CommandRouter::publish_state`] (retained, state
/// observers notified). Position-only updates are published straight on the
/// transport, not retained, so the retained state stays a full snapshot.
pub struct StatusPublisher<T: Transport = TransportClient> {
	router: CommandRouter<T>,
	player: Arc<dyn Player>,
	config: StatusPublisherConfig,
	worker: Mutex<Option<Worker>>,
}

impl<T: Transport> StatusPublisher<T> {
	pub fn new(
		router: CommandRouter<T>,
		player: Arc<dyn Player>,
		config: StatusPublisherConfig,
	) -> Self {
		Self {
			router,
			player,
			config,
			worker: Mutex::new(None),
		}
	}

	/// Creates a publisher tuned from the router's raw configuration.
	pub fn from_router(
		router: CommandRouter<T>,
		player: Arc<dyn Player>,
	) -> Result<Self, ConfigError> {
		let config = StatusPublisherConfig::from_raw(&router.config().raw_config)?;
		Ok(Self::new(router, player, config))
	}

	pub fn config(&self) -> &StatusPublisherConfig {
		&self.config
	}

	pub fn is_running(&self) -> bool {
		self.worker
			.lock()
			.as_ref()
			.is_some_and(|worker| !worker.handle.is_finished())
	}

	/// Spawns the polling task. Returns false when it is already running.
	///
	/// Must be called from within a tokio runtime.
	pub fn start(&self) -> bool {
		let mut worker = self.worker.lock();
		if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
			warn!("Status publisher is already running");
			return false;
		}

		let cancel = CancellationToken::new();
		let handle = tokio::spawn(run(
			self.router.clone(),
			Arc::clone(&self.player),
			self.config.clone(),
			cancel.clone(),
		));
		*worker = Some(Worker { cancel, handle });
		info!(interval = ?self.config.update_interval, "Started status publisher");
		true
	}

	/// Stops the polling task, waiting at most [`STOP_TIMEOUT`] for it to
	/// finish before aborting it.
	pub async fn stop(&self) {
		let worker = self.worker.lock().take();
		let Some(Worker { cancel, mut handle }) = worker else {
			return;
		};
		cancel.cancel();
		if time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
			warn!(timeout = ?STOP_TIMEOUT, "Status publisher did not stop in time, aborting");
			handle.abort();
		}
		info!("Stopped status publisher");
	}
}

impl<T: Transport> Drop for StatusPublisher<T> {
	fn drop(&mut self) {
		if let Some(worker) = self.worker.get_mut().take() {
			worker.cancel.cancel();
		}
	}
}

async fn run<T: Transport>(
	router: CommandRouter<T>,
	player: Arc<dyn Player>,
	config: StatusPublisherConfig,
	cancel: CancellationToken,
) {
	let mut throttle = StatusThrottle::new(&config);
	let mut ticker = time::interval(config.update_interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			_ = ticker.tick() => {}
		}

		let status = match fetch_status(&player).await {
			| Ok(status) => status,
			| Err(err) => {
				error!(error = %err, "Error in status update loop");
				continue;
			}
		};
		let decision = throttle.decide(&status, Instant::now());
		publish_update(&router, &status, decision);
	}
	debug!("Status publisher loop terminated");
}

/// Reads the player status on the blocking pool; a panicking player is
/// reported as a backend error.
async fn fetch_status(player: &Arc<dyn Player>) -> Result<PlayerStatus, PlayerError> {
	let player = Arc::clone(player);
	tokio::task::spawn_blocking(move || {
		catch_unwind(AssertUnwindSafe(|| player.get_status()))
			.unwrap_or_else(|panic| Err(PlayerError::Backend(panic_message(&*panic))))
	})
	.await
	.unwrap_or_else(|err| Err(PlayerError::Backend(err.to_string())))
}

fn publish_update<T: Transport>(
	router: &CommandRouter<T>,
	status: &PlayerStatus,
	decision: UpdateDecision,
) {
	match decision {
		| UpdateDecision::Full => {
			debug!(state = %status.state, "Publishing full status update");
			router.publish_state(status);
		}
		| UpdateDecision::Position(position) => {
			trace!(position, "Publishing position update");
			let payload = json!({
				"state": status.state.as_str(),
				"current_song": { "position": position },
			});
			let topic = router.namespace().topic_for(TopicKind::State);
			router.transport().publish(
				topic,
				Payload::Json(payload),
				router.default_qos(),
				false,
			);
		}
		| UpdateDecision::Skip => {}
	}
}
