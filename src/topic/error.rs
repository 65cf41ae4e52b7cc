//! Error types and utilities for the topic module
//!
//! This module contains the composite error type and shared constants
//! for the topic module, while individual error types remain in their
//! respective modules.

use thiserror::Error;

use super::topic_pattern_item::TopicPatternError;

/// Comprehensive error type for all topic-related operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Topic pattern parsing or validation error
	#[error("Topic pattern error: {0}")]
	Pattern(#[from] TopicPatternError),

	/// Topic is not usable as a publish target
	#[error("Topic '{topic}' is invalid for publishing: {reason}")]
	InvalidPublishTopic {
		/// The rejected topic
		topic: String,
		/// Why it was rejected
		reason: String,
	},

	/// A namespace component (prefix or device id) is unusable
	#[error("Invalid namespace component '{component}': {reason}")]
	InvalidNamespace {
		/// The rejected component
		component: String,
		/// Why it was rejected
		reason: String,
	},
}

impl TopicError {
	/// Creates a new InvalidPublishTopic error
	pub fn invalid_publish_topic(
		topic: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::InvalidPublishTopic {
			topic: topic.into(),
			reason: reason.into(),
		}
	}

	/// Creates a new InvalidNamespace error
	pub fn invalid_namespace(
		component: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::InvalidNamespace {
			component: component.into(),
			reason: reason.into(),
		}
	}
}

/// Convenient Result type for topic operations
pub type TopicResult<T> = Result<T, TopicError>;

/// Topic processing limits and constants
pub mod limits {
	/// Maximum topic nesting depth allowed
	pub const MAX_TOPIC_DEPTH: usize = 32;

	/// Maximum total topic length accepted by the MQTT protocol
	pub const MAX_TOPIC_LENGTH: usize = 65535;
}

/// Validation utilities for topic operations
pub mod validation {
	use super::limits::*;
	use super::{TopicError, TopicPatternError};

	/// Validates a concrete topic used for publishing.
	pub fn validate_publish_topic(topic: &str) -> Result<(), TopicError> {
		if topic.is_empty() || topic.len() > MAX_TOPIC_LENGTH {
			return Err(TopicError::invalid_publish_topic(
				topic,
				"Topic is empty or too long",
			));
		}
		if topic.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
			return Err(TopicError::invalid_publish_topic(
				topic,
				"Topic contains illegal characters ('#', '+', or null byte)",
			));
		}
		Ok(())
	}

	/// Validates topic pattern for subscription constraints
	pub fn validate_pattern_for_subscription(
		pattern: &str,
	) -> Result<(), TopicPatternError> {
		if pattern.is_empty() || pattern.trim().is_empty() {
			return Err(TopicPatternError::EmptyTopic);
		}

		let depth = pattern.split('/').count();
		if depth > MAX_TOPIC_DEPTH {
			return Err(TopicPatternError::wildcard_usage(format!(
				"Pattern too deep: {depth} segments > {MAX_TOPIC_DEPTH}"
			)));
		}

		if pattern.contains('\0') {
			return Err(TopicPatternError::wildcard_usage(
				"Pattern contains a null byte",
			));
		}

		Ok(())
	}

	/// Validates a single namespace component (topic prefix or device id).
	///
	/// Components are inserted verbatim into topics, so they must not
	/// carry wildcards and must not be empty.
	pub fn validate_namespace_component(
		component: &str,
	) -> Result<(), TopicError> {
		if component.is_empty() {
			return Err(TopicError::invalid_namespace(component, "is empty"));
		}
		if component.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
			return Err(TopicError::invalid_namespace(
				component,
				"contains '#', '+' or a null byte",
			));
		}
		Ok(())
	}
}
