//! Command name to handler table.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::error::HandlerError;
use super::observers::panic_message;
use crate::message::{CommandMessage, CommandParams, ResponseMessage};

/// Result of a command handler; the value is echoed as `data.result`.
pub type HandlerResult = Result<Value, HandlerError>;

/// Handler invoked with the parameters of a command.
pub type CommandHandler = Arc<dyn Fn(&CommandParams) -> HandlerResult + Send + Sync>;

/// Registered command handlers.
///
/// Handlers are normally registered once before connecting; registration
/// stays safe while commands are being executed.
#[derive(Default)]
pub struct CommandRegistry {
	handlers: RwLock<HashMap<String, CommandHandler>>,
}

impl CommandRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handler` for `command`, replacing any earlier one.
	pub fn register(
		&self,
		command: impl Into<String>,
		handler: impl Fn(&CommandParams) -> HandlerResult + Send + Sync + 'static,
	) {
		let command = command.into();
		info!(command = %command, "Registered handler for command");
		if self
			.handlers
			.write()
			.insert(command.clone(), Arc::new(handler))
			.is_some()
		{
			warn!(command = %command, "Replaced existing command handler");
		}
	}

	pub fn get(&self, command: &str) -> Option<CommandHandler> {
		self.handlers.read().get(command).cloned()
	}

	pub fn contains(&self, command: &str) -> bool {
		self.handlers.read().contains_key(command)
	}

	/// Registered command names, sorted.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<_> = self.handlers.read().keys().cloned().collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.handlers.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.read().is_empty()
	}

	/// Runs the handler of a command and builds its response.
	///
	/// Always yields exactly one response: an unknown command, a handler
	/// error and a handler panic all produce `result = false`. A handler
	/// value other than `false` counts as success.
	pub fn execute(&self, command: &CommandMessage) -> ResponseMessage {
		let name = command.command.as_str();
		let command_id = command.command_id.as_str();
		info!(command = name, command_id, "Executing command");

		let Some(handler) = self.get(name) else {
			warn!(command = name, "Command not supported");
			return ResponseMessage::failure(
				command_id,
				format!("Command {name} not supported"),
			);
		};

		let empty = CommandParams::new();
		let params = command.params.as_ref().unwrap_or(&empty);
		let error = match catch_unwind(AssertUnwindSafe(|| handler(params))) {
			| Ok(Ok(value)) => {
				let mut response = ResponseMessage::success(
					command_id,
					format!("Command {name} executed"),
					None,
				);
				response.result = value != Value::Bool(false);
				response.data = Some(json!({ "result": value }));
				return response;
			}
			| Ok(Err(err)) => err.to_string(),
			| Err(panic) => panic_message(&*panic),
		};
		error!(command = name, command_id, error = %error, "Error executing command");
		ResponseMessage::failure(command_id, format!("Error executing command: {error}"))
	}
}

impl std::fmt::Debug for CommandRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandRegistry")
			.field("commands", &self.names())
			.finish()
	}
}
