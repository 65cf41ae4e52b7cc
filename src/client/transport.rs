use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{BrokerConfig, ClientSettings};
use super::error::{ConnectionEstablishmentError, TransportError};
use super::last_will::LastWill;
use super::payload::Payload;
use crate::connection::{
	self, ConnectionState, OutboundPublish, ReconnectPolicy, Shared,
};
use crate::routing::MessageCallback;
use crate::topic::validation::validate_publish_topic;

/// Publish/subscribe transport used by the command router.
///
/// `publish`, `subscribe` and `unsubscribe` never wait for a connection:
/// they return `false` immediately when the session is not connected.
pub trait Transport: Send + Sync + 'static {
	/// Establishes the session and starts background I/O.
	fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

	/// Closes the session and cancels any pending reconnect.
	fn disconnect(&self) -> impl Future<Output = ()> + Send;

	fn publish(&self, topic: &str, payload: Payload, qos: QoS, retain: bool) -> bool;

	/// Subscribes to a topic or wildcard pattern, optionally registering a
	/// callback for the messages it delivers.
	fn subscribe(
		&self,
		topic: &str,
		qos: QoS,
		callback: Option<MessageCallback>,
	) -> bool;

	fn unsubscribe(&self, topic: &str) -> bool;

	/// Sets the message the broker publishes after an ungraceful disconnect.
	/// Applies to the next `connect()`.
	fn set_last_will(&self, will: LastWill);

	/// Registers a callback fired with `true` when a session is established
	/// and with `false` when the broker refuses one.
	fn on_connect(&self, callback: impl Fn(bool) + Send + Sync + 'static);

	/// Registers a callback fired when an established session ends.
	fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static);

	fn is_connected(&self) -> bool;
}

/// Tasks of one session: the event loop, the inbound dispatcher and the
/// publish forwarder.
struct Session {
	cancel: CancellationToken,
	handle: JoinHandle<()>,
	dispatcher: JoinHandle<()>,
	forwarder: JoinHandle<()>,
}

impl Session {
	fn abort(self) {
		self.cancel.cancel();
		self.handle.abort();
		self.dispatcher.abort();
		self.forwarder.abort();
	}
}

/// MQTT transport client built on `rumqttc`.
///
/// Owns the reconnection state machine: an unexpected disconnect moves the
/// client to [`ConnectionState::Reconnecting`] and reconnect attempts are
/// made with exponential backoff (1s doubling up to the configured maximum)
/// until one succeeds or `disconnect()` is called.
pub struct TransportClient {
	options: MqttOptions,
	settings: ClientSettings,
	policy: ReconnectPolicy,
	shared: Arc<Shared>,
	session: tokio::sync::Mutex<Option<Session>>,
}

impl TransportClient {
	/// Creates a client from a broker configuration.
	///
	/// Fails on invalid configuration (including unreadable TLS material);
	/// no connection is attempted.
	pub fn new(config: &BrokerConfig) -> Result<Self, TransportError> {
		Self::with_settings(config, ClientSettings::default())
	}

	pub fn with_settings(
		config: &BrokerConfig,
		settings: ClientSettings,
	) -> Result<Self, TransportError> {
		let options = config.mqtt_options()?;
		Ok(Self::from_options(
			options,
			settings,
			config.options.reconnect_on_failure,
			config.options.max_reconnect_delay,
		))
	}

	/// Creates a client from prepared `rumqttc` options.
	pub fn from_options(
		options: MqttOptions,
		settings: ClientSettings,
		reconnect_on_failure: bool,
		max_reconnect_delay: Duration,
	) -> Self {
		Self {
			options,
			settings,
			policy: ReconnectPolicy {
				enabled: reconnect_on_failure,
				max_delay: max_reconnect_delay,
			},
			shared: Arc::new(Shared::new()),
			session: tokio::sync::Mutex::new(None),
		}
	}

	/// Current position in the reconnection state machine.
	pub fn state(&self) -> ConnectionState {
		self.shared.state()
	}

	/// Receiver notified on every state change.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.shared.watch_state()
	}

	/// Establishes the session and starts its tasks.
	///
	/// On failure with reconnection enabled a reconnect is already scheduled
	/// when the error is returned; with reconnection disabled the failure is
	/// terminal.
	pub async fn connect(&self) -> Result<(), TransportError> {
		let mut session = self.session.lock().await;
		if let Some(existing) = session.take() {
			if self.shared.state() != ConnectionState::Idle {
				*session = Some(existing);
				return Err(TransportError::AlreadyConnected);
			}
			existing.abort();
		}
		self.shared.set_closing(false);

		let mut options = self.options.clone();
		let last_will = self.shared.last_will.lock().clone();
		if let Some(will) = last_will {
			match will.to_mqtt() {
				| Ok(will) => {
					options.set_last_will(will);
				}
				| Err(err) => {
					error!(error = %err, "Failed to encode last will, connecting without it");
				}
			}
		}
		let (host, port) = options.broker_address();
		info!(host = %host, port, client_id = %options.client_id(), "Connecting to MQTT broker");

		let (client, mut event_loop) =
			AsyncClient::new(options, self.settings.event_loop_capacity);
		self.shared.set_client(Some(client.clone()));

		let timeout_millis = self.settings.connection_timeout_millis;
		let bootstrap = time::timeout(
			Duration::from_millis(timeout_millis),
			connection::establish_connection(&mut event_loop),
		)
		.await
		.unwrap_or(Err(ConnectionEstablishmentError::Timeout { timeout_millis }));

		match bootstrap {
			| Ok(()) => {
				info!(host = %host, port, "Connected to MQTT broker");
				*session = Some(self.spawn_session(client, event_loop, false));
				self.shared.resubscribe_all();
				self.shared.transition(ConnectionState::Connected);
				Ok(())
			}
			| Err(err) => {
				error!(error = %err, "Failed to connect to MQTT broker");
				if matches!(err, ConnectionEstablishmentError::BrokerRejected { .. }) {
					self.shared.connect_observers.notify(&false);
				}
				if self.policy.enabled {
					self.shared.transition(ConnectionState::Reconnecting);
					*session = Some(self.spawn_session(client, event_loop, true));
				} else {
					self.shared.set_client(None);
					self.shared.transition(ConnectionState::Idle);
				}
				Err(err.into())
			}
		}
	}

	fn spawn_session(
		&self,
		client: AsyncClient,
		event_loop: EventLoop,
		reconnect_pending: bool,
	) -> Session {
		let cancel = CancellationToken::new();
		let (inbound_tx, inbound_rx) =
			mpsc::channel(self.settings.inbound_channel_capacity);
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		self.shared.set_outbound(Some(outbound_tx));

		let dispatcher = tokio::spawn(connection::dispatch_inbound(
			Arc::clone(&self.shared),
			inbound_rx,
		));
		let forwarder = tokio::spawn(connection::forward_publishes(client, outbound_rx));
		let handle = tokio::spawn(connection::run(
			event_loop,
			Arc::clone(&self.shared),
			inbound_tx,
			self.policy,
			cancel.clone(),
			reconnect_pending,
		));
		Session {
			cancel,
			handle,
			dispatcher,
			forwarder,
		}
	}

	/// Closes the session.
	///
	/// Flushes queued publishes, cancels a pending reconnect, sends
	/// DISCONNECT when connected and waits for the event loop (each step
	/// bounded by the shutdown timeout) before releasing the client. Moves to
	/// [`ConnectionState::Idle`].
	pub async fn disconnect(&self) {
		let mut session = self.session.lock().await;
		let Some(Session {
			cancel,
			mut handle,
			dispatcher,
			mut forwarder,
		}) = session.take()
		else {
			debug!("Disconnect requested without an active session");
			return;
		};
		let timeout = Duration::from_millis(self.settings.shutdown_timeout_millis);

		// closing the queue lets the forwarder finish what was already queued
		drop(self.shared.take_outbound());
		if time::timeout(timeout, &mut forwarder).await.is_err() {
			warn!("Queued publishes not flushed in time, dropping them");
			forwarder.abort();
		}
		dispatcher.abort();

		self.shared.set_closing(true);
		cancel.cancel();

		if let Some(client) = self.shared.client().filter(|_| self.shared.is_connected()) {
			match time::timeout(timeout, client.disconnect()).await {
				| Ok(Ok(())) => {}
				| Ok(Err(err)) => warn!(error = %err, "Failed to send MQTT Disconnect"),
				| Err(_) => warn!("MQTT Disconnect not queued in time"),
			}
		}

		match time::timeout(timeout, &mut handle).await {
			| Ok(Ok(())) => {}
			| Ok(Err(err)) => warn!(error = %err, "Event loop task failed"),
			| Err(_) => {
				warn!(timeout = ?timeout, "Event loop did not stop in time, aborting");
				handle.abort();
			}
		}

		self.shared.set_client(None);
		self.shared.transition(ConnectionState::Idle);
		info!("Disconnected from MQTT broker");
	}

	/// Queues a publish for the session's forwarder. True once queued; the
	/// forwarder waits for room in the request channel.
	pub fn publish(
		&self,
		topic: &str,
		payload: impl Into<Payload>,
		qos: QoS,
		retain: bool,
	) -> bool {
		if self.connected_client("publish", topic).is_none() {
			return false;
		}
		if let Err(err) = validate_publish_topic(topic) {
			error!(topic, error = %err, "Refusing to publish");
			return false;
		}
		let bytes = match payload.into().to_bytes() {
			| Ok(bytes) => bytes,
			| Err(err) => {
				error!(topic, error = %err, "Failed to encode payload");
				return false;
			}
		};
		debug!(topic, payload_size = bytes.len(), retain, "Publishing");
		let queued = self.shared.enqueue(OutboundPublish {
			topic: topic.to_string(),
			payload: bytes,
			qos,
			retain,
		});
		if !queued {
			error!(topic, "Failed to publish: session is closing");
		}
		queued
	}

	pub fn subscribe(
		&self,
		topic: &str,
		qos: QoS,
		callback: Option<MessageCallback>,
	) -> bool {
		let Some(client) = self.connected_client("subscribe", topic) else {
			return false;
		};
		if let Err(err) = self.shared.subscriptions.insert(topic, qos, callback) {
			error!(topic, error = %err, "Invalid subscription topic");
			return false;
		}
		match client.try_subscribe(topic, qos) {
			| Ok(()) => {
				info!(topic, "Subscribed");
				true
			}
			| Err(err) => {
				error!(topic, error = %err, "Failed to subscribe");
				false
			}
		}
	}

	pub fn unsubscribe(&self, topic: &str) -> bool {
		let Some(client) = self.connected_client("unsubscribe", topic) else {
			return false;
		};
		self.shared.subscriptions.remove(topic);
		match client.try_unsubscribe(topic) {
			| Ok(()) => {
				info!(topic, "Unsubscribed");
				true
			}
			| Err(err) => {
				error!(topic, error = %err, "Failed to unsubscribe");
				false
			}
		}
	}

	pub fn set_last_will(&self, will: LastWill) {
		if self.shared.state() != ConnectionState::Idle {
			warn!(topic = %will.topic, "Last will changed on a live session; applies to the next connect");
		}
		*self.shared.last_will.lock() = Some(will);
	}

	pub fn on_connect(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
		self.shared
			.connect_observers
			.register(move |connected: &bool| callback(*connected));
	}

	pub fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
		self.shared.disconnect_observers.register(move |_: &()| callback());
	}

	pub fn is_connected(&self) -> bool {
		self.shared.is_connected()
	}

	fn connected_client(&self, operation: &str, topic: &str) -> Option<AsyncClient> {
		let client = self
			.shared
			.client()
			.filter(|_| self.shared.is_connected());
		if client.is_none() {
			warn!(operation, topic, "Not connected to MQTT broker");
		}
		client
	}
}

impl Transport for TransportClient {
	async fn connect(&self) -> Result<(), TransportError> {
		TransportClient::connect(self).await
	}

	async fn disconnect(&self) {
		TransportClient::disconnect(self).await
	}

	fn publish(&self, topic: &str, payload: Payload, qos: QoS, retain: bool) -> bool {
		TransportClient::publish(self, topic, payload, qos, retain)
	}

	fn subscribe(
		&self,
		topic: &str,
		qos: QoS,
		callback: Option<MessageCallback>,
	) -> bool {
		TransportClient::subscribe(self, topic, qos, callback)
	}

	fn unsubscribe(&self, topic: &str) -> bool {
		TransportClient::unsubscribe(self, topic)
	}

	fn set_last_will(&self, will: LastWill) {
		TransportClient::set_last_will(self, will)
	}

	fn on_connect(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
		TransportClient::on_connect(self, callback)
	}

	fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
		TransportClient::on_disconnect(self, callback)
	}

	fn is_connected(&self) -> bool {
		TransportClient::is_connected(self)
	}
}

impl std::fmt::Debug for TransportClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransportClient")
			.field("broker", &self.options.broker_address())
			.field("state", &self.state())
			.field("subscriptions", &self.shared.subscriptions)
			.finish()
	}
}
