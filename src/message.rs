//! Message codec
//!
//! Typed message variants exchanged on the device topics and their JSON
//! encoding. Every variant carries a `timestamp` in seconds since the Unix
//! epoch (float), defaulted to "now" when a payload omits it.

pub mod command;
pub mod connection;
pub mod state;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub use command::{CommandMessage, CommandParams, ResponseMessage};
pub use connection::{ConnectionMessage, ConnectionStatus};
pub use state::{PlaybackState, SongInfo, StateMessage};

use crate::client::Payload;
use crate::message_serializer::{JsonSerializer, MessageSerializer};

/// Errors raised while encoding or decoding messages.
#[derive(Debug, Error)]
pub enum CodecError {
	/// Payload is not UTF-8 JSON or does not fit the expected variant
	#[error("Invalid {kind} payload: {source}")]
	Json {
		/// Variant being decoded or encoded
		kind: MessageKind,
		/// Underlying serde error
		#[source]
		source: serde_json::Error,
	},

	/// Payload is not UTF-8 JSON at all
	#[error("Payload is not valid JSON: {0}")]
	Malformed(#[source] serde_json::Error),

	/// Payload is valid JSON but not an object
	#[error("Payload is not a JSON object")]
	NotAnObject,

	/// Kind could not be inferred from the keys present
	#[error("Unable to determine message kind from keys: {keys:?}")]
	UnknownKind {
		/// Keys found in the payload
		keys: Vec<String>,
	},
}

/// Discriminant of the message variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
	/// Player state snapshot
	State,
	/// Inbound command
	Command,
	/// Response to a command
	Response,
	/// Online/offline status
	Connection,
}

impl fmt::Display for MessageKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			| MessageKind::State => "state",
			| MessageKind::Command => "command",
			| MessageKind::Response => "response",
			| MessageKind::Connection => "connection",
		})
	}
}

/// Any message of the device namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	/// Player state snapshot
	State(StateMessage),
	/// Inbound command
	Command(CommandMessage),
	/// Response to a command
	Response(ResponseMessage),
	/// Online/offline status
	Connection(ConnectionMessage),
}

impl Message {
	/// Decodes a payload.
	///
	/// With an expected kind the payload is decoded as that variant. Without
	/// one, the kind is inferred from the keys present: `command`, then
	/// `result` together with `command_id`, then `state`, then `status`.
	pub fn parse(
		payload: &[u8],
		kind: Option<MessageKind>,
	) -> Result<Self, CodecError> {
		let kind = match kind {
			| Some(kind) => kind,
			| None => infer_kind(payload)?,
		};
		let message = match kind {
			| MessageKind::State => Message::State(decode(payload, kind)?),
			| MessageKind::Command => Message::Command(decode(payload, kind)?),
			| MessageKind::Response => {
				Message::Response(decode(payload, kind)?)
			}
			| MessageKind::Connection => {
				Message::Connection(decode(payload, kind)?)
			}
		};
		Ok(message)
	}

	/// Variant discriminant.
	pub fn kind(&self) -> MessageKind {
		match self {
			| Message::State(_) => MessageKind::State,
			| Message::Command(_) => MessageKind::Command,
			| Message::Response(_) => MessageKind::Response,
			| Message::Connection(_) => MessageKind::Connection,
		}
	}

	/// Creation time in seconds since the Unix epoch.
	pub fn timestamp(&self) -> f64 {
		match self {
			| Message::State(m) => m.timestamp,
			| Message::Command(m) => m.timestamp,
			| Message::Response(m) => m.timestamp,
			| Message::Connection(m) => m.timestamp,
		}
	}

	/// Encodes the message as a JSON string.
	pub fn to_json(&self) -> Result<String, CodecError> {
		match self {
			| Message::State(m) => m.to_json(),
			| Message::Command(m) => m.to_json(),
			| Message::Response(m) => m.to_json(),
			| Message::Connection(m) => m.to_json(),
		}
	}

	/// Encodes the message as a structured transport payload.
	pub fn to_payload(&self) -> Result<Payload, CodecError> {
		match self {
			| Message::State(m) => m.to_payload(),
			| Message::Command(m) => m.to_payload(),
			| Message::Response(m) => m.to_payload(),
			| Message::Connection(m) => m.to_payload(),
		}
	}
}

fn infer_kind(payload: &[u8]) -> Result<MessageKind, CodecError> {
	let value: Value =
		serde_json::from_slice(payload).map_err(CodecError::Malformed)?;
	let object = value.as_object().ok_or(CodecError::NotAnObject)?;
	if object.contains_key("command") {
		Ok(MessageKind::Command)
	} else if object.contains_key("result") && object.contains_key("command_id")
	{
		Ok(MessageKind::Response)
	} else if object.contains_key("state") {
		Ok(MessageKind::State)
	} else if object.contains_key("status") {
		Ok(MessageKind::Connection)
	} else {
		Err(CodecError::UnknownKind {
			keys: object.keys().cloned().collect(),
		})
	}
}

fn decode<T: DeserializeOwned>(
	payload: &[u8],
	kind: MessageKind,
) -> Result<T, CodecError> {
	let value: Value = JsonSerializer
		.deserialize(payload)
		.map_err(|source| CodecError::Json { kind, source })?;
	if !value.is_object() {
		return Err(CodecError::NotAnObject);
	}
	serde_json::from_value(value)
		.map_err(|source| CodecError::Json { kind, source })
}

/// Shared encoding behaviour of the message variants.
pub trait WireMessage: Serialize + DeserializeOwned + 'static {
	/// Variant discriminant.
	const KIND: MessageKind;

	/// Decodes this variant from a payload.
	fn from_slice(payload: &[u8]) -> Result<Self, CodecError> {
		decode(payload, Self::KIND)
	}

	/// Decodes this variant from a JSON string.
	fn from_json(json: &str) -> Result<Self, CodecError> {
		Self::from_slice(json.as_bytes())
	}

	/// Encodes this message as a JSON string.
	fn to_json(&self) -> Result<String, CodecError> {
		serde_json::to_string(self).map_err(|source| CodecError::Json {
			kind: Self::KIND,
			source,
		})
	}

	/// Encodes this message as a JSON object.
	fn to_map(&self) -> Result<Map<String, Value>, CodecError> {
		match serde_json::to_value(self) {
			| Ok(Value::Object(map)) => Ok(map),
			| Ok(_) => Err(CodecError::NotAnObject),
			| Err(source) => Err(CodecError::Json {
				kind: Self::KIND,
				source,
			}),
		}
	}

	/// Encodes this message as a structured transport payload.
	fn to_payload(&self) -> Result<Payload, CodecError> {
		self.to_map().map(|map| Payload::Json(Value::Object(map)))
	}
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn now_timestamp() -> f64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs_f64())
		.unwrap_or_default()
}
