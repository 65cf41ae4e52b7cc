//! Command routing over the device topics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use rumqttc::QoS;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::error::RouterError;
use super::observers::ObserverList;
use super::registry::{CommandRegistry, HandlerResult};
use super::subscription_table::MessageCallback;
use crate::client::{
	BrokerConfig, InboundMessage, LastWill, Transport, TransportClient,
	TransportError,
};
use crate::message::{
	CommandMessage, CommandParams, ConnectionMessage, ConnectionStatus,
	ResponseMessage, StateMessage, WireMessage,
};
use crate::topic::{TopicKind, TopicNamespace};

/// Routes device commands to their handlers and publishes device state.
///
/// Owns one transport and the topic namespace of one device. On every
/// established connection it subscribes to the commands topic (until the
/// transport has accepted it once; the transport restores it after a
/// session loss) and publishes
/// `online` on the connection topic. The last will publishes `offline` there
/// when the connection is lost ungracefully; [`disconnect`](Self::disconnect)
/// publishes `offline` itself before closing.
///
/// Cloning is cheap and yields a handle to the same router.
pub struct CommandRouter<T: Transport = TransportClient> {
	inner: Arc<RouterInner<T>>,
}

struct RouterInner<T> {
	transport: T,
	config: BrokerConfig,
	namespace: TopicNamespace,
	registry: CommandRegistry,
	command_observers: ObserverList<CommandMessage>,
	state_observers: ObserverList<StateMessage>,
	connected: AtomicBool,
	subscribed: AtomicBool,
}

/// Non-owning handle to a [`CommandRouter`], for handlers stored inside the
/// router itself.
pub struct WeakCommandRouter<T: Transport = TransportClient> {
	inner: Weak<RouterInner<T>>,
}

impl<T: Transport> WeakCommandRouter<T> {
	pub fn upgrade(&self) -> Option<CommandRouter<T>> {
		self.inner.upgrade().map(|inner| CommandRouter { inner })
	}
}

impl<T: Transport> Clone for WeakCommandRouter<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Weak::clone(&self.inner),
		}
	}
}

impl<T: Transport> Clone for CommandRouter<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl CommandRouter<TransportClient> {
	/// Creates a router with a `rumqttc` transport for `config`.
	///
	/// Fails fast on configuration faults; nothing is connected yet.
	pub fn new(config: BrokerConfig) -> Result<Self, RouterError> {
		let transport = TransportClient::new(&config)?;
		Self::with_transport(config, transport)
	}
}

impl<T: Transport> CommandRouter<T> {
	/// Creates a router on top of an existing transport.
	///
	/// Registers the connect/disconnect callbacks and the `offline` last will.
	pub fn with_transport(
		config: BrokerConfig,
		transport: T,
	) -> Result<Self, RouterError> {
		config.validate()?;
		let namespace = TopicNamespace::new(
			config.topic_prefix.as_str(),
			config.device_id.as_str(),
		)?;
		let inner = Arc::new(RouterInner {
			transport,
			config,
			namespace,
			registry: CommandRegistry::new(),
			command_observers: ObserverList::new("command"),
			state_observers: ObserverList::new("state_change"),
			connected: AtomicBool::new(false),
			subscribed: AtomicBool::new(false),
		});

		let weak = Arc::downgrade(&inner);
		inner.transport.on_connect(move |success| {
			if let Some(inner) = weak.upgrade() {
				RouterInner::handle_connect(&inner, success);
			}
		});
		let weak = Arc::downgrade(&inner);
		inner.transport.on_disconnect(move || {
			if let Some(inner) = weak.upgrade() {
				inner.handle_disconnect();
			}
		});
		inner.set_last_will();

		Ok(Self { inner })
	}

	/// Connects the transport.
	pub async fn connect(&self) -> Result<(), TransportError> {
		self.inner.transport.connect().await
	}

	/// Publishes `offline` (retained) and closes the transport.
	pub async fn disconnect(&self) {
		if self.inner.transport.is_connected() {
			self.inner.publish_connection_status(ConnectionStatus::Offline);
		}
		self.inner.transport.disconnect().await;
		self.inner.connected.store(false, Ordering::SeqCst);
	}

	/// True between a successful connect and the next disconnect.
	pub fn is_connected(&self) -> bool {
		self.inner.connected.load(Ordering::SeqCst)
	}

	/// Registers the handler producing the response of `command`.
	///
	/// Safe to call at any time; handlers are usually registered before
	/// connecting.
	pub fn register_command_handler(
		&self,
		command: impl Into<String>,
		handler: impl Fn(&CommandParams) -> HandlerResult + Send + Sync + 'static,
	) {
		self.inner.registry.register(command, handler);
	}

	/// Registers an observer notified of every routed command, after its
	/// response has been published.
	pub fn register_command_callback(
		&self,
		callback: impl Fn(&CommandMessage) + Send + Sync + 'static,
	) {
		self.inner.command_observers.register(callback);
	}

	/// Registers an observer notified of every full state publish.
	pub fn register_state_change_callback(
		&self,
		callback: impl Fn(&StateMessage) + Send + Sync + 'static,
	) {
		self.inner.state_observers.register(callback);
	}

	/// Publishes a full state snapshot, retained, after notifying the state
	/// observers.
	///
	/// Accepts a [`StateMessage`], a [`PlayerStatus`](crate::player::PlayerStatus)
	/// or a raw key-value snapshot (converted field by field).
	pub fn publish_state(&self, state: impl Into<StateMessage>) -> bool {
		let state = state.into();
		self.inner.state_observers.notify(&state);
		self.inner.publish_message(TopicKind::State, &state, true)
	}

	/// Publishes a command response on the responses topic, not retained.
	pub fn publish_response(&self, response: &ResponseMessage) -> bool {
		self.inner.publish_response(response)
	}

	/// Decodes and routes a raw command payload, as received on the commands
	/// topic.
	pub fn handle_command_payload(&self, payload: &[u8]) {
		self.inner.route_command(self.command_topic(), payload);
	}

	/// Runs a decoded command through the registry and publishes the response.
	pub fn handle_command(&self, command: CommandMessage) -> ResponseMessage {
		self.inner.dispatch_command(command)
	}

	pub fn registry(&self) -> &CommandRegistry {
		&self.inner.registry
	}

	pub fn namespace(&self) -> &TopicNamespace {
		&self.inner.namespace
	}

	pub fn config(&self) -> &BrokerConfig {
		&self.inner.config
	}

	pub fn default_qos(&self) -> QoS {
		self.inner.config.default_qos
	}

	pub fn downgrade(&self) -> WeakCommandRouter<T> {
		WeakCommandRouter {
			inner: Arc::downgrade(&self.inner),
		}
	}

	/// Underlying transport, for traffic outside the command flow.
	pub fn transport(&self) -> &T {
		&self.inner.transport
	}

	fn command_topic(&self) -> &str {
		self.inner.namespace.topic_for(TopicKind::Commands)
	}
}

impl<T: Transport> RouterInner<T> {
	fn set_last_will(&self) {
		let will = match ConnectionMessage::offline().to_payload() {
			| Ok(payload) => payload,
			| Err(err) => {
				error!(error = %err, "Failed to encode last will");
				return;
			}
		};
		let topic = self.namespace.topic_for(TopicKind::Connection);
		self.transport.set_last_will(
			LastWill::new(topic.as_str(), will)
				.qos(self.config.default_qos)
				.retain(true),
		);
	}

	fn handle_connect(inner: &Arc<Self>, success: bool) {
		if !success {
			inner.connected.store(false, Ordering::SeqCst);
			error!("Failed to connect to MQTT broker");
			return;
		}
		inner.connected.store(true, Ordering::SeqCst);
		info!(device_id = %inner.namespace.device_id(), "Connected to MQTT broker");

		if !inner.subscribed.load(Ordering::SeqCst) {
			let mut subscribed = true;
			for topic in inner.namespace.subscription_topics() {
				let weak: Weak<Self> = Arc::downgrade(inner);
				let callback: MessageCallback =
					Arc::new(move |message: &InboundMessage| {
						if let Some(inner) = weak.upgrade() {
							inner.route_command(&message.topic, &message.payload);
						}
					});
				if inner.transport.subscribe(&topic, inner.config.default_qos, Some(callback)) {
					info!(topic = %topic, "Subscribed to topic");
				} else {
					error!(topic = %topic, "Failed to subscribe to topic");
					subscribed = false;
				}
			}
			// retried on the next connect until every topic is accepted
			inner.subscribed.store(subscribed, Ordering::SeqCst);
		}

		inner.publish_connection_status(ConnectionStatus::Online);
	}

	fn handle_disconnect(&self) {
		self.connected.store(false, Ordering::SeqCst);
		info!("Disconnected from MQTT broker");
	}

	/// Payloads that are not a JSON object are dropped; an object that is
	/// not a valid command is answered with a failed response.
	fn route_command(&self, topic: &str, payload: &[u8]) {
		info!(topic, "Received command");
		let value = match serde_json::from_slice::<Value>(payload) {
			| Ok(value @ Value::Object(_)) => value,
			| Ok(_) => {
				error!(topic, "Command payload is not a JSON object");
				return;
			}
			| Err(err) => {
				error!(topic, error = %err, "Invalid command message received");
				return;
			}
		};
		match CommandMessage::deserialize(&value) {
			| Ok(command) => {
				self.dispatch_command(command);
			}
			| Err(err) => {
				warn!(topic, error = %err, "Malformed command");
				if let Value::Object(object) = &value {
					let response = ResponseMessage::invalid_command(object, err);
					if !self.publish_response(&response) {
						warn!(command_id = %response.command_id, "Command response was not published");
					}
				}
			}
		}
	}

	fn dispatch_command(&self, command: CommandMessage) -> ResponseMessage {
		let response = self.registry.execute(&command);
		if !self.publish_response(&response) {
			warn!(command_id = %response.command_id, "Command response was not published");
		}
		self.command_observers.notify(&command);
		response
	}

	fn publish_response(&self, response: &ResponseMessage) -> bool {
		self.publish_message(TopicKind::Responses, response, false)
	}

	fn publish_connection_status(&self, status: ConnectionStatus) -> bool {
		debug!(status = %status, "Publishing connection status");
		self.publish_message(TopicKind::Connection, &ConnectionMessage::new(status), true)
	}

	fn publish_message<M: WireMessage>(
		&self,
		kind: TopicKind,
		message: &M,
		retain: bool,
	) -> bool {
		let topic = self.namespace.topic_for(kind);
		match message.to_payload() {
			| Ok(payload) => self.transport.publish(
				topic,
				payload,
				self.config.default_qos,
				retain,
			),
			| Err(err) => {
				error!(topic = %topic, error = %err, "Failed to encode message");
				false
			}
		}
	}
}
