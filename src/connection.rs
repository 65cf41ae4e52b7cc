//! MQTT connection management
//!
//! State shared between the transport client and its session tasks, and
//! the tasks themselves:
//! - the event loop owns the reconnection state machine: after an
//!   unexpected disconnect it waits for the current backoff delay and polls
//!   the `rumqttc` event loop again, which performs the reconnect;
//! - the dispatcher runs subscription callbacks for inbound publishes, so
//!   the event loop keeps polling while handlers work;
//! - the forwarder hands queued publishes to the `rumqttc` request channel,
//!   waiting for room instead of failing when it is full.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{
	AsyncClient, ConnAck, ConnectReturnCode, ConnectionError, EventLoop, QoS,
};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::client::error::ConnectionEstablishmentError;
use crate::client::{Backoff, InboundMessage, LastWill};
use crate::routing::{ObserverList, SubscriptionTable};

/// Position in the reconnection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
	/// Session established, requests are accepted
	Connected,
	/// Not connected and not trying to be: never connected, closed locally,
	/// or lost with reconnection disabled
	#[default]
	Idle,
	/// Connection lost or refused; waiting for the backoff timer or for the
	/// next attempt to complete
	Reconnecting,
}

/// Publish waiting for the forwarder.
#[derive(Debug)]
pub(crate) struct OutboundPublish {
	pub topic: String,
	pub payload: Vec<u8>,
	pub qos: QoS,
	pub retain: bool,
}

/// State shared by the transport client and its session tasks.
pub(crate) struct Shared {
	state: watch::Sender<ConnectionState>,
	client: RwLock<Option<AsyncClient>>,
	outbound: Mutex<Option<mpsc::UnboundedSender<OutboundPublish>>>,
	pub(crate) subscriptions: SubscriptionTable,
	pub(crate) connect_observers: ObserverList<bool>,
	pub(crate) disconnect_observers: ObserverList<()>,
	pub(crate) last_will: Mutex<Option<LastWill>>,
	closing: AtomicBool,
}

impl Shared {
	pub(crate) fn new() -> Self {
		let (state, _) = watch::channel(ConnectionState::Idle);
		Self {
			state,
			client: RwLock::new(None),
			outbound: Mutex::new(None),
			subscriptions: SubscriptionTable::new(),
			connect_observers: ObserverList::new("on_connect"),
			disconnect_observers: ObserverList::new("on_disconnect"),
			last_will: Mutex::new(None),
			closing: AtomicBool::new(false),
		}
	}

	pub(crate) fn state(&self) -> ConnectionState {
		*self.state.borrow()
	}

	pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.state.subscribe()
	}

	pub(crate) fn is_connected(&self) -> bool {
		self.state() == ConnectionState::Connected
	}

	/// Moves to `next` and fires the connect or disconnect observers on a
	/// transition into or out of `Connected`.
	///
	/// The state is updated before observers run, so an observer that
	/// subscribes or publishes sees the new state.
	pub(crate) fn transition(&self, next: ConnectionState) {
		let previous = self.state.send_replace(next);
		if previous == next {
			return;
		}
		debug!(from = ?previous, to = ?next, "Connection state changed");
		if next == ConnectionState::Connected {
			self.connect_observers.notify(&true);
		} else if previous == ConnectionState::Connected {
			self.disconnect_observers.notify(&());
		}
	}

	pub(crate) fn client(&self) -> Option<AsyncClient> {
		self.client.read().clone()
	}

	pub(crate) fn set_client(&self, client: Option<AsyncClient>) {
		*self.client.write() = client;
	}

	pub(crate) fn set_outbound(
		&self,
		outbound: Option<mpsc::UnboundedSender<OutboundPublish>>,
	) {
		*self.outbound.lock() = outbound;
	}

	/// Takes the publish queue; the forwarder ends once it has drained it.
	pub(crate) fn take_outbound(&self) -> Option<mpsc::UnboundedSender<OutboundPublish>> {
		self.outbound.lock().take()
	}

	/// Queues a publish for the forwarder. False when no session is running.
	pub(crate) fn enqueue(&self, publish: OutboundPublish) -> bool {
		match self.outbound.lock().as_ref() {
			| Some(outbound) => outbound.send(publish).is_ok(),
			| None => false,
		}
	}

	pub(crate) fn is_closing(&self) -> bool {
		self.closing.load(Ordering::SeqCst)
	}

	pub(crate) fn set_closing(&self, closing: bool) {
		self.closing.store(closing, Ordering::SeqCst);
	}

	/// Re-sends SUBSCRIBE for every known topic after the broker dropped the
	/// session.
	pub(crate) fn resubscribe_all(&self) {
		let Some(client) = self.client() else {
			return;
		};
		let topics = self.subscriptions.topics();
		if topics.is_empty() {
			return;
		}
		info!(count = topics.len(), "Resubscribing to all topics");
		for (topic, qos) in topics {
			if let Err(err) = client.try_subscribe(topic.as_str(), qos) {
				error!(topic = %topic, error = %err, "Failed to resubscribe");
			}
		}
	}
}

/// Reconnection settings of a session.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReconnectPolicy {
	pub enabled: bool,
	pub max_delay: Duration,
}

/// Waits for the first CONNACK of a fresh event loop.
pub(crate) async fn establish_connection(
	event_loop: &mut EventLoop,
) -> Result<(), ConnectionEstablishmentError> {
	loop {
		match event_loop.poll().await {
			| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
				if code == ConnectReturnCode::Success {
					debug!("MQTT connection established successfully");
					return Ok(());
				}
				debug!(code = ?code, "MQTT connection rejected by broker");
				return Err(ConnectionEstablishmentError::BrokerRejected { code });
			}
			| Ok(notification) => {
				trace!(notification = ?notification, "Bootstrap phase notification");
			}
			| Err(ConnectionError::ConnectionRefused(code)) => {
				debug!(code = ?code, "MQTT connection rejected by broker");
				return Err(ConnectionEstablishmentError::BrokerRejected { code });
			}
			| Err(connection_err) => {
				debug!(error = %connection_err, "MQTT connection error during bootstrap phase");
				return Err(ConnectionEstablishmentError::Network(connection_err));
			}
		}
	}
}

/// Event loop task of one session.
///
/// With `reconnect_pending` set the loop starts by waiting for the first
/// backoff delay. The loop ends when the client sends DISCONNECT, when
/// `cancel` fires while not connected, or after a connection loss with
/// reconnection disabled.
pub(crate) async fn run(
	mut event_loop: EventLoop,
	shared: Arc<Shared>,
	inbound: mpsc::Sender<InboundMessage>,
	policy: ReconnectPolicy,
	cancel: CancellationToken,
	mut reconnect_pending: bool,
) {
	let mut backoff = Backoff::new(policy.max_delay);

	loop {
		if reconnect_pending {
			let delay = backoff.next_delay();
			shared.transition(ConnectionState::Reconnecting);
			info!(delay = ?delay, attempt = backoff.attempts(), "Scheduling MQTT reconnect");
			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = time::sleep(delay) => {}
			}
			reconnect_pending = false;
			debug!("Attempting MQTT reconnect");
		}

		let connected = shared.is_connected();
		let event = tokio::select! {
			biased;
			_ = cancel.cancelled(), if !connected => break,
			event = event_loop.poll() => event,
		};

		match event {
			| Ok(Incoming(Packet::ConnAck(ConnAck {
				code: ConnectReturnCode::Success,
				session_present,
			}))) => {
				backoff.reset();
				if session_present {
					info!("MQTT reconnected with session preserved");
				} else {
					info!("MQTT reconnected without session");
					shared.resubscribe_all();
				}
				shared.transition(ConnectionState::Connected);
			}
			| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. })))
			| Err(ConnectionError::ConnectionRefused(code)) => {
				warn!(code = ?code, "MQTT connection rejected by broker");
				shared.connect_observers.notify(&false);
				if !connection_lost(&shared, policy) {
					break;
				}
				reconnect_pending = true;
			}
			| Ok(Incoming(Publish(publish))) => {
				trace!(topic = %publish.topic, payload_size = publish.payload.len(), "Received MQTT message");
				if inbound.send(InboundMessage::from(publish)).await.is_err() {
					error!("Inbound dispatcher stopped, dropping message");
				}
			}
			| Ok(Incoming(Disconnect)) => {
				warn!("Received MQTT Disconnect packet from server");
				if !connection_lost(&shared, policy) {
					break;
				}
				reconnect_pending = true;
			}
			| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
				info!("Sent MQTT Disconnect packet to server");
				shared.transition(ConnectionState::Idle);
				break;
			}
			| Ok(notification) => {
				trace!(notification = ?notification, "MQTT notification");
			}
			| Err(err) => {
				if shared.is_closing() {
					debug!(error = %err, "Event loop error while closing");
					break;
				}
				error!(error = %err, "MQTT connection error");
				if !connection_lost(&shared, policy) {
					break;
				}
				reconnect_pending = true;
			}
		}
	}
	info!("MQTT event loop terminated");
}

/// Dispatcher task of one session: runs the subscription callbacks of every
/// inbound publish, in arrival order, on the blocking pool (handlers may
/// block on the player). Ends when the event loop ends.
pub(crate) async fn dispatch_inbound(
	shared: Arc<Shared>,
	mut inbound: mpsc::Receiver<InboundMessage>,
) {
	while let Some(message) = inbound.recv().await {
		let shared = Arc::clone(&shared);
		let topic = message.topic.clone();
		let dispatched =
			tokio::task::spawn_blocking(move || shared.subscriptions.dispatch(&message));
		if let Err(err) = dispatched.await {
			error!(topic = %topic, error = %err, "Message dispatch failed");
		}
	}
	debug!("Inbound dispatcher terminated");
}

/// Forwarder task of one session: moves queued publishes into the `rumqttc`
/// request channel, in order. Ends when the queue is closed and drained.
pub(crate) async fn forward_publishes(
	client: AsyncClient,
	mut outbound: mpsc::UnboundedReceiver<OutboundPublish>,
) {
	while let Some(publish) = outbound.recv().await {
		let OutboundPublish {
			topic,
			payload,
			qos,
			retain,
		} = publish;
		if let Err(err) = client.publish(topic.as_str(), qos, retain, payload).await {
			error!(topic = %topic, error = %err, "Failed to publish");
		}
	}
	debug!("Publish forwarder terminated");
}

/// Handles an unexpected loss. Returns true when a reconnect should be
/// scheduled.
fn connection_lost(shared: &Shared, policy: ReconnectPolicy) -> bool {
	if policy.enabled && !shared.is_closing() {
		shared.transition(ConnectionState::Reconnecting);
		true
	} else {
		shared.transition(ConnectionState::Idle);
		false
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use super::*;

	#[test]
	fn test_transitions_fire_observers_once() {
		let shared = Shared::new();
		let connects = Arc::new(AtomicUsize::new(0));
		let disconnects = Arc::new(AtomicUsize::new(0));

		let counter = Arc::clone(&connects);
		shared.connect_observers.register(move |ok| {
			assert!(*ok);
			counter.fetch_add(1, Ordering::SeqCst);
		});
		let counter = Arc::clone(&disconnects);
		shared.disconnect_observers.register(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		shared.transition(ConnectionState::Reconnecting);
		assert_eq!(disconnects.load(Ordering::SeqCst), 0);

		shared.transition(ConnectionState::Connected);
		shared.transition(ConnectionState::Connected);
		assert_eq!(connects.load(Ordering::SeqCst), 1);

		shared.transition(ConnectionState::Reconnecting);
		shared.transition(ConnectionState::Idle);
		assert_eq!(disconnects.load(Ordering::SeqCst), 1);
		assert_eq!(shared.state(), ConnectionState::Idle);
	}

	#[test]
	fn test_observer_sees_new_state() {
		let shared = Arc::new(Shared::new());
		let seen = Arc::new(Mutex::new(None));

		let inner = Arc::clone(&shared);
		let slot = Arc::clone(&seen);
		shared.connect_observers.register(move |_| {
			*slot.lock() = Some(inner.is_connected());
		});
		shared.transition(ConnectionState::Connected);

		assert_eq!(*seen.lock(), Some(true));
	}

	#[test]
	fn test_loss_policy() {
		let policy = ReconnectPolicy {
			enabled: true,
			max_delay: Duration::from_secs(8),
		};
		let shared = Shared::new();
		shared.transition(ConnectionState::Connected);

		assert!(connection_lost(&shared, policy));
		assert_eq!(shared.state(), ConnectionState::Reconnecting);

		shared.set_closing(true);
		assert!(!connection_lost(&shared, policy));
		assert_eq!(shared.state(), ConnectionState::Idle);

		let disabled = ReconnectPolicy {
			enabled: false,
			..policy
		};
		shared.set_closing(false);
		shared.transition(ConnectionState::Connected);
		assert!(!connection_lost(&shared, disabled));
		assert_eq!(shared.state(), ConnectionState::Idle);
	}

	#[tokio::test]
	async fn test_watch_state_observes_transitions() {
		let shared = Shared::new();
		let mut rx = shared.watch_state();

		shared.transition(ConnectionState::Reconnecting);
		rx.changed().await.unwrap();
		assert_eq!(*rx.borrow(), ConnectionState::Reconnecting);
	}
}
