//! Last Will and Testament message

use rumqttc::QoS;

use super::payload::Payload;

/// Message the broker publishes on behalf of the client after an ungraceful
/// disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct LastWill {
	/// The topic to which the LWT message will be published.
	pub topic: String,
	/// The payload of the LWT message.
	pub payload: Payload,
	/// The Quality of Service level for the LWT message.
	pub qos: QoS,
	/// Whether the LWT message should be retained by the broker.
	pub retain: bool,
}

impl LastWill {
	/// Creates a last will with QoS 1 and no retain flag.
	pub fn new(topic: impl Into<String>, payload: impl Into<Payload>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			qos: QoS::AtLeastOnce,
			retain: false,
		}
	}

	/// Sets the QoS level for the LWT message.
	pub fn qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}

	/// Sets the retain flag for the LWT message.
	pub fn retain(mut self, retain: bool) -> Self {
		self.retain = retain;
		self
	}

	/// Encodes the payload into the `rumqttc` representation.
	pub(crate) fn to_mqtt(&self) -> Result<rumqttc::LastWill, serde_json::Error> {
		let payload = self.payload.to_bytes()?;
		Ok(rumqttc::LastWill::new(
			self.topic.clone(),
			payload,
			self.qos,
			self.retain,
		))
	}
}
