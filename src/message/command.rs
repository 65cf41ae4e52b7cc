//! Command and response messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{MessageKind, WireMessage, now_timestamp};

/// Keyword parameters of a command, taken verbatim from the payload.
pub type CommandParams = Map<String, Value>;

fn new_command_id() -> String {
	uuid::Uuid::new_v4().to_string()
}

/// Command addressed to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
	/// Command name, looked up in the command registry
	pub command: String,
	/// Correlation id echoed by the response
	#[serde(default = "new_command_id")]
	pub command_id: String,
	#[serde(default)]
	pub params: Option<CommandParams>,
	#[serde(default = "now_timestamp")]
	pub timestamp: f64,
}

impl CommandMessage {
	/// Creates a command with a fresh id and no parameters.
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			command_id: new_command_id(),
			params: None,
			timestamp: now_timestamp(),
		}
	}

	/// Replaces the generated command id.
	pub fn with_id(mut self, command_id: impl Into<String>) -> Self {
		self.command_id = command_id.into();
		self
	}

	/// Sets the command parameters.
	pub fn with_params(mut self, params: CommandParams) -> Self {
		self.params = Some(params);
		self
	}

	/// Looks up a single parameter.
	pub fn param(&self, name: &str) -> Option<&Value> {
		self.params.as_ref().and_then(|p| p.get(name))
	}

	/// Correlation id of a command object that failed to decode: echoed
	/// when it is a string, stringified when it is another value, generated
	/// when absent.
	pub fn recover_id(object: &Map<String, Value>) -> String {
		match object.get("command_id") {
			| Some(Value::String(id)) => id.clone(),
			| None | Some(Value::Null) => new_command_id(),
			| Some(other) => other.to_string(),
		}
	}
}

impl WireMessage for CommandMessage {
	const KIND: MessageKind = MessageKind::Command;
}

/// Outcome of a command, published on the responses topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
	pub command_id: String,
	pub result: bool,
	#[serde(default)]
	pub message: Option<String>,
	#[serde(default)]
	pub data: Option<Value>,
	#[serde(default = "now_timestamp")]
	pub timestamp: f64,
}

impl ResponseMessage {
	/// Successful response carrying handler output.
	pub fn success(
		command_id: impl Into<String>,
		message: impl Into<String>,
		data: Option<Value>,
	) -> Self {
		Self {
			command_id: command_id.into(),
			result: true,
			message: Some(message.into()),
			data,
			timestamp: now_timestamp(),
		}
	}

	/// Failed response with an explanation.
	pub fn failure(
		command_id: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self {
			command_id: command_id.into(),
			result: false,
			message: Some(message.into()),
			data: None,
			timestamp: now_timestamp(),
		}
	}
}

impl ResponseMessage {
	/// Failed response to a command object that could not be decoded.
	pub fn invalid_command(
		object: &Map<String, Value>,
		reason: impl std::fmt::Display,
	) -> Self {
		Self::failure(
			CommandMessage::recover_id(object),
			format!("Invalid command: {reason}"),
		)
	}
}

impl WireMessage for ResponseMessage {
	const KIND: MessageKind = MessageKind::Response;
}
