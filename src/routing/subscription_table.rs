//! Subscription bookkeeping and inbound dispatch of the transport.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use arcstr::ArcStr;
use parking_lot::RwLock;
use rumqttc::QoS;
use tracing::{debug, error, trace};

use super::observers::panic_message;
use crate::client::InboundMessage;
use crate::topic::TopicPattern;

/// Callback invoked for each inbound message on a subscribed topic.
pub type MessageCallback = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

struct Entry {
	qos: QoS,
	pattern: TopicPattern,
	callbacks: Vec<MessageCallback>,
}

/// Subscribed topics with their QoS and callbacks.
///
/// Exact topics are looked up directly; wildcard patterns are matched
/// against every inbound topic.
#[derive(Default)]
pub struct SubscriptionTable {
	exact: RwLock<HashMap<ArcStr, Entry>>,
	wildcard: RwLock<HashMap<ArcStr, Entry>>,
}

impl SubscriptionTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a subscription and optionally a callback for it.
	///
	/// Subscribing again to a known topic keeps its earlier callbacks and
	/// updates its QoS.
	pub fn insert(
		&self,
		topic: &str,
		qos: QoS,
		callback: Option<MessageCallback>,
	) -> Result<(), crate::topic::TopicPatternError> {
		let pattern = TopicPattern::try_from(topic)?;
		let key = pattern.as_arcstr();
		let table = if pattern.is_wildcard() {
			&self.wildcard
		} else {
			&self.exact
		};
		let mut table = table.write();
		let entry = table.entry(key).or_insert_with(|| Entry {
			qos,
			pattern,
			callbacks: Vec::new(),
		});
		entry.qos = qos;
		if let Some(callback) = callback {
			entry.callbacks.push(callback);
		}
		Ok(())
	}

	/// Forgets a subscription and its callbacks. Returns false when unknown.
	pub fn remove(&self, topic: &str) -> bool {
		self.exact.write().remove(topic).is_some()
			|| self.wildcard.write().remove(topic).is_some()
	}

	pub fn contains(&self, topic: &str) -> bool {
		self.exact.read().contains_key(topic)
			|| self.wildcard.read().contains_key(topic)
	}

	/// Every subscribed topic with its QoS, for re-subscribing after a
	/// session loss.
	pub fn topics(&self) -> Vec<(ArcStr, QoS)> {
		let exact = self.exact.read();
		let wildcard = self.wildcard.read();
		exact
			.iter()
			.chain(wildcard.iter())
			.map(|(topic, entry)| (topic.clone(), entry.qos))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.exact.read().len() + self.wildcard.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Delivers a message to the callbacks of the exact topic, then to the
	/// callbacks of every matching wildcard pattern.
	///
	/// A panicking callback is logged and does not affect the others.
	/// Returns the number of callbacks invoked.
	pub fn dispatch(&self, message: &InboundMessage) -> usize {
		let callbacks = self.matching_callbacks(&message.topic);
		if callbacks.is_empty() {
			debug!(topic = %message.topic, "No callback registered for topic");
			return 0;
		}
		trace!(
			topic = %message.topic,
			callbacks = callbacks.len(),
			payload_size = message.payload.len(),
			"Dispatching inbound message"
		);
		for callback in &callbacks {
			if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(message)))
			{
				error!(
					topic = %message.topic,
					error = %panic_message(&*panic),
					"Message callback panicked"
				);
			}
		}
		callbacks.len()
	}

	fn matching_callbacks(&self, topic: &str) -> Vec<MessageCallback> {
		let mut callbacks = Vec::new();
		if let Some(entry) = self.exact.read().get(topic) {
			callbacks.extend(entry.callbacks.iter().cloned());
		}
		for entry in self.wildcard.read().values() {
			if entry.pattern.matches(topic) {
				callbacks.extend(entry.callbacks.iter().cloned());
			}
		}
		callbacks
	}
}

impl std::fmt::Debug for SubscriptionTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SubscriptionTable")
			.field("exact", &self.exact.read().keys().collect::<Vec<_>>())
			.field("wildcard", &self.wildcard.read().keys().collect::<Vec<_>>())
			.finish()
	}
}
