//! Shared fixtures for the integration tests: an in-memory transport, a
//! scripted player and tracing setup.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use device_link::advanced::{InboundMessage, LastWill, MessageCallback, Payload};
use device_link::errors::{ConnectionEstablishmentError, TransportError};
use device_link::{
	BrokerConfig, Message, PlaybackState, Player, PlayerError, PlayerStatus, QoS,
	SongInfo, Transport,
};
use parking_lot::Mutex;
use rumqttc::ConnectReturnCode;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG`, once per test binary.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn test_config() -> BrokerConfig {
	BrokerConfig::new("broker.test", "speaker-1")
}

/// Packet recorded by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct Published {
	pub topic: String,
	pub payload: Payload,
	pub qos: QoS,
	pub retain: bool,
}

impl Published {
	pub fn json(&self) -> Value {
		self.payload.as_json().cloned().unwrap_or(Value::Null)
	}

	pub fn message(&self) -> Message {
		let bytes = self.payload.to_bytes().unwrap();
		Message::parse(&bytes, None).unwrap()
	}
}

type ConnectCallback = Arc<dyn Fn(bool) + Send + Sync>;
type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// In-memory transport: records publishes and delivers messages to the
/// subscription callbacks on demand.
#[derive(Default)]
pub struct MockTransport {
	connected: AtomicBool,
	refuse: AtomicBool,
	refuse_subscriptions: AtomicBool,
	connects: AtomicUsize,
	published: Mutex<Vec<Published>>,
	subscriptions: Mutex<HashMap<String, (QoS, Option<MessageCallback>)>>,
	subscribe_calls: AtomicUsize,
	last_will: Mutex<Option<LastWill>>,
	connect_callbacks: Mutex<Vec<ConnectCallback>>,
	disconnect_callbacks: Mutex<Vec<DisconnectCallback>>,
}

impl MockTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes the next connects fail as if the broker refused them.
	pub fn refuse_connections(&self, refuse: bool) {
		self.refuse.store(refuse, Ordering::SeqCst);
	}

	/// Makes the next subscribes fail without recording the topic.
	pub fn refuse_subscriptions(&self, refuse: bool) {
		self.refuse_subscriptions.store(refuse, Ordering::SeqCst);
	}

	pub fn published(&self) -> Vec<Published> {
		self.published.lock().clone()
	}

	pub fn published_on(&self, topic: &str) -> Vec<Published> {
		self.published()
			.into_iter()
			.filter(|p| p.topic == topic)
			.collect()
	}

	pub fn clear_published(&self) {
		self.published.lock().clear();
	}

	pub fn subscribed_topics(&self) -> Vec<String> {
		let mut topics: Vec<_> = self.subscriptions.lock().keys().cloned().collect();
		topics.sort();
		topics
	}

	pub fn subscribe_calls(&self) -> usize {
		self.subscribe_calls.load(Ordering::SeqCst)
	}

	pub fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}

	pub fn last_will(&self) -> Option<LastWill> {
		self.last_will.lock().clone()
	}

	/// Delivers a message as if the broker had routed it to this client.
	/// Returns false when no subscription callback matched the topic.
	pub fn deliver(&self, topic: &str, payload: impl Into<bytes::Bytes>) -> bool {
		let callback = self
			.subscriptions
			.lock()
			.get(topic)
			.and_then(|(_, callback)| callback.clone());
		match callback {
			| Some(callback) => {
				callback(&InboundMessage::new(topic.to_string(), payload));
				true
			}
			| None => false,
		}
	}

	/// Ends the session as if the connection dropped.
	pub fn drop_connection(&self) {
		if self.connected.swap(false, Ordering::SeqCst) {
			self.fire_disconnect();
		}
	}

	fn fire_connect(&self, success: bool) {
		let callbacks = self.connect_callbacks.lock().clone();
		for callback in callbacks {
			callback(success);
		}
	}

	fn fire_disconnect(&self) {
		let callbacks = self.disconnect_callbacks.lock().clone();
		for callback in callbacks {
			callback();
		}
	}
}

impl Transport for MockTransport {
	async fn connect(&self) -> Result<(), TransportError> {
		self.connects.fetch_add(1, Ordering::SeqCst);
		if self.refuse.load(Ordering::SeqCst) {
			self.fire_connect(false);
			return Err(ConnectionEstablishmentError::BrokerRejected {
				code: ConnectReturnCode::NotAuthorized,
			}
			.into());
		}
		if self.connected.swap(true, Ordering::SeqCst) {
			return Err(TransportError::AlreadyConnected);
		}
		self.fire_connect(true);
		Ok(())
	}

	async fn disconnect(&self) {
		self.drop_connection();
	}

	fn publish(&self, topic: &str, payload: Payload, qos: QoS, retain: bool) -> bool {
		if !self.is_connected() {
			return false;
		}
		self.published.lock().push(Published {
			topic: topic.to_string(),
			payload,
			qos,
			retain,
		});
		true
	}

	fn subscribe(
		&self,
		topic: &str,
		qos: QoS,
		callback: Option<MessageCallback>,
	) -> bool {
		if !self.is_connected() || self.refuse_subscriptions.load(Ordering::SeqCst) {
			return false;
		}
		self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
		self.subscriptions
			.lock()
			.insert(topic.to_string(), (qos, callback));
		true
	}

	fn unsubscribe(&self, topic: &str) -> bool {
		self.is_connected() && self.subscriptions.lock().remove(topic).is_some()
	}

	fn set_last_will(&self, will: LastWill) {
		*self.last_will.lock() = Some(will);
	}

	fn on_connect(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
		self.connect_callbacks.lock().push(Arc::new(callback));
	}

	fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
		self.disconnect_callbacks.lock().push(Arc::new(callback));
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}
}

/// Player whose status is set by the test and whose actions are recorded.
#[derive(Default)]
pub struct ScriptedPlayer {
	status: Mutex<PlayerStatus>,
	actions: Mutex<Vec<String>>,
	playlists: Mutex<HashMap<String, Vec<String>>>,
}

impl ScriptedPlayer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn playing(file: &str, position: f64) -> Self {
		let player = Self::new();
		player.set_status(PlayerStatus {
			state: PlaybackState::Play,
			current_song: Some(SongInfo {
				file: Some(file.to_string()),
				title: Some("Test Song".to_string()),
				position: Some(position),
				..SongInfo::default()
			}),
			volume: 40,
			..PlayerStatus::default()
		});
		player
	}

	pub fn set_status(&self, status: PlayerStatus) {
		*self.status.lock() = status;
	}

	pub fn update(&self, change: impl FnOnce(&mut PlayerStatus)) {
		change(&mut *self.status.lock());
	}

	pub fn actions(&self) -> Vec<String> {
		self.actions.lock().clone()
	}

	fn record(&self, action: impl Into<String>) {
		self.actions.lock().push(action.into());
	}
}

impl Player for ScriptedPlayer {
	fn get_status(&self) -> Result<PlayerStatus, PlayerError> {
		Ok(self.status.lock().clone())
	}

	fn play(&self) -> Result<(), PlayerError> {
		self.record("play");
		self.update(|s| s.state = PlaybackState::Play);
		Ok(())
	}

	fn pause(&self) -> Result<(), PlayerError> {
		self.record("pause");
		self.update(|s| s.state = PlaybackState::Pause);
		Ok(())
	}

	fn set_volume(&self, volume: u8) -> Result<(), PlayerError> {
		self.record(format!("set_volume:{volume}"));
		self.update(|s| s.volume = volume);
		Ok(())
	}

	fn set_repeat(&self, repeat: bool) -> Result<(), PlayerError> {
		self.record(format!("set_repeat:{repeat}"));
		self.update(|s| s.repeat = repeat);
		Ok(())
	}

	fn get_playlists(&self) -> Result<Vec<String>, PlayerError> {
		let mut names: Vec<_> = self.playlists.lock().keys().cloned().collect();
		names.sort();
		Ok(names)
	}

	fn play_playlist(&self, name: &str) -> Result<(), PlayerError> {
		if !self.playlists.lock().contains_key(name) {
			return Err(PlayerError::PlaylistNotFound(name.to_string()));
		}
		self.record(format!("play_playlist:{name}"));
		self.update(|s| s.playlist = Some(name.to_string()));
		Ok(())
	}

	fn create_playlist(&self, name: &str, files: &[String]) -> Result<(), PlayerError> {
		self.playlists
			.lock()
			.insert(name.to_string(), files.to_vec());
		Ok(())
	}
}
