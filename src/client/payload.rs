//! Outbound payloads and inbound messages.

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::message_serializer::{JsonSerializer, MessageSerializer};

/// Payload handed to the transport for publishing.
///
/// Structured payloads are encoded as UTF-8 JSON; text and raw bytes are
/// sent unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	Json(Value),
	Text(String),
	Bytes(Bytes),
}

impl Payload {
	/// Wire bytes of the payload.
	pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
		match self {
			| Payload::Json(value) => JsonSerializer.serialize(value),
			| Payload::Text(text) => Ok(text.as_bytes().to_vec()),
			| Payload::Bytes(bytes) => Ok(bytes.to_vec()),
		}
	}

	/// Structured view of the payload, when it holds JSON.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			| Payload::Json(value) => Some(value),
			| _ => None,
		}
	}
}

impl From<Value> for Payload {
	fn from(value: Value) -> Self {
		Payload::Json(value)
	}
}

impl From<Map<String, Value>> for Payload {
	fn from(map: Map<String, Value>) -> Self {
		Payload::Json(Value::Object(map))
	}
}

impl From<String> for Payload {
	fn from(text: String) -> Self {
		Payload::Text(text)
	}
}

impl From<&str> for Payload {
	fn from(text: &str) -> Self {
		Payload::Text(text.to_owned())
	}
}

impl From<Bytes> for Payload {
	fn from(bytes: Bytes) -> Self {
		Payload::Bytes(bytes)
	}
}

impl From<Vec<u8>> for Payload {
	fn from(bytes: Vec<u8>) -> Self {
		Payload::Bytes(Bytes::from(bytes))
	}
}

/// Message delivered to subscription callbacks.
#[derive(Debug, Clone)]
pub struct InboundMessage {
	pub topic: ArcStr,
	pub payload: Bytes,
	pub qos: QoS,
	pub retain: bool,
}

impl InboundMessage {
	pub fn new(topic: impl Into<ArcStr>, payload: impl Into<Bytes>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			qos: QoS::AtLeastOnce,
			retain: false,
		}
	}

	/// Payload as text, if it is valid UTF-8.
	pub fn payload_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.payload).ok()
	}

	/// Decodes the payload as JSON.
	pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		serde_json::from_slice(&self.payload)
	}
}

impl From<rumqttc::Publish> for InboundMessage {
	fn from(publish: rumqttc::Publish) -> Self {
		Self {
			topic: ArcStr::from(publish.topic),
			payload: publish.payload,
			qos: publish.qos,
			retain: publish.retain,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_structured_payload_is_utf8_json() {
		let payload = Payload::from(json!({"status": "online"}));
		let bytes = payload.to_bytes().unwrap();

		assert_eq!(
			serde_json::from_slice::<Value>(&bytes).unwrap(),
			json!({"status": "online"})
		);
	}

	#[test]
	fn test_raw_payloads_pass_through() {
		let raw = vec![0xff, 0x00, 0x10];
		assert_eq!(Payload::from(raw.clone()).to_bytes().unwrap(), raw);
		assert_eq!(Payload::from("héllo").to_bytes().unwrap(), "héllo".as_bytes());
	}

	#[test]
	fn test_inbound_json() {
		let message = InboundMessage::new("a/b", Bytes::from_static(br#"{"x": 1}"#));
		let value: Value = message.json().unwrap();

		assert_eq!(value["x"], json!(1));
		assert_eq!(message.payload_str(), Some(r#"{"x": 1}"#));
	}
}
