use thiserror::Error;

use crate::client::{ConfigError, TransportError};
use crate::player::PlayerError;
use crate::topic::TopicError;

/// Failure of a command handler, reported back in the command response.
#[derive(Debug, Error)]
pub enum HandlerError {
	#[error("Missing parameter '{0}'")]
	MissingParam(String),

	#[error("Invalid parameter '{name}': {reason}")]
	InvalidParam { name: String, reason: String },

	#[error(transparent)]
	Player(#[from] PlayerError),

	#[error("{0}")]
	Failed(String),
}

impl HandlerError {
	pub fn missing(name: impl Into<String>) -> Self {
		Self::MissingParam(name.into())
	}

	pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::InvalidParam {
			name: name.into(),
			reason: reason.into(),
		}
	}

	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}
}

/// Errors raised while setting up a command router.
#[derive(Debug, Error)]
pub enum RouterError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("Topic error: {0}")]
	Topic(#[from] TopicError),

	#[error("Transport error: {0}")]
	Transport(#[from] TransportError),
}
