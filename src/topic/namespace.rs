//! Device topic namespace.
//!
//! Every topic the device publishes or subscribes to is derived from one
//! `(prefix, device_id)` pair: `{prefix}/{device_id}/{kind}`.

use std::fmt;
use std::str::FromStr;

use arcstr::ArcStr;

use super::error::{TopicError, validation};

/// Kind of message carried by a device topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
	/// Retained player state, device to broker
	State,
	/// Commands addressed to the device
	Commands,
	/// Responses to commands, device to broker
	Responses,
	/// Retained online/offline status (also the last will)
	Connection,
}

impl TopicKind {
	/// All topic kinds in namespace order.
	pub const ALL: [TopicKind; 4] = [
		TopicKind::State,
		TopicKind::Commands,
		TopicKind::Responses,
		TopicKind::Connection,
	];

	/// Last topic segment for this kind.
	pub fn as_str(&self) -> &'static str {
		match self {
			| TopicKind::State => "state",
			| TopicKind::Commands => "commands",
			| TopicKind::Responses => "responses",
			| TopicKind::Connection => "connection",
		}
	}

	fn index(self) -> usize {
		match self {
			| TopicKind::State => 0,
			| TopicKind::Commands => 1,
			| TopicKind::Responses => 2,
			| TopicKind::Connection => 3,
		}
	}
}

impl fmt::Display for TopicKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TopicKind {
	type Err = TopicError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		TopicKind::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| {
				TopicError::invalid_namespace(s, "unknown topic kind")
			})
	}
}

/// Builds, validates and parses the topics of a single device.
#[derive(Debug, Clone)]
pub struct TopicNamespace {
	prefix: ArcStr,
	device_id: ArcStr,
	topics: [ArcStr; 4],
}

impl TopicNamespace {
	/// Creates the namespace for `device_id` under `prefix`.
	///
	/// The prefix may span several levels (`amora/devices`); the device id
	/// must be a single level.
	pub fn new(
		prefix: impl Into<ArcStr>,
		device_id: impl Into<ArcStr>,
	) -> Result<Self, TopicError> {
		let prefix = prefix.into();
		let device_id = device_id.into();
		validation::validate_namespace_component(&prefix)?;
		validation::validate_namespace_component(&device_id)?;
		if device_id.contains('/') {
			return Err(TopicError::invalid_namespace(
				device_id.as_str(),
				"device id must be a single topic level",
			));
		}

		let topics = TopicKind::ALL.map(|kind| {
			ArcStr::from(format!("{prefix}/{device_id}/{}", kind.as_str()))
		});
		Ok(Self {
			prefix,
			device_id,
			topics,
		})
	}

	/// Topic prefix shared by all devices.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Device identifier.
	pub fn device_id(&self) -> &str {
		&self.device_id
	}

	/// Full topic for the given kind.
	pub fn topic_for(&self, kind: TopicKind) -> &ArcStr {
		&self.topics[kind.index()]
	}

	/// True only for the four topics derived from this namespace.
	pub fn is_valid(&self, topic: &str) -> bool {
		self.topics.iter().any(|t| t.as_str() == topic)
	}

	/// Kind of a namespace topic, `None` for anything outside the namespace.
	pub fn parse(&self, topic: &str) -> Option<TopicKind> {
		if !self.is_valid(topic) {
			return None;
		}
		let (_, last) = topic.rsplit_once('/')?;
		last.parse().ok()
	}

	/// Topics the device subscribes to once connected.
	pub fn subscription_topics(&self) -> Vec<ArcStr> {
		vec![self.topic_for(TopicKind::Commands).clone()]
	}

	/// Wildcard covering every topic of this device.
	pub fn wildcard_topic(&self) -> String {
		format!("{}/{}/#", self.prefix, self.device_id)
	}

	/// Wildcard covering every topic of every device under the prefix.
	pub fn all_devices_wildcard(&self) -> String {
		format!("{}/+/#", self.prefix)
	}
}
