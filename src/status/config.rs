use std::time::Duration;

use serde_json::Value;

use crate::client::ConfigError;
use crate::client::config::{bool_field, seconds_field};

/// Tuning of the status publisher, read from the `status_updater` section
/// of the raw configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPublisherConfig {
	/// Polling period of the player
	pub update_interval: Duration,
	/// Minimum spacing of position-only updates while playing
	pub position_update_interval: Duration,
	/// Maximum spacing of full state updates
	pub full_update_interval: Duration,
	pub enabled: bool,
}

impl Default for StatusPublisherConfig {
	fn default() -> Self {
		Self {
			update_interval: Duration::from_secs(1),
			position_update_interval: Duration::from_secs(1),
			full_update_interval: Duration::from_secs(5),
			enabled: true,
		}
	}
}

impl StatusPublisherConfig {
	/// Reads the `status_updater` section, falling back to the defaults for
	/// absent keys and for an absent section.
	pub fn from_raw(raw_config: &Value) -> Result<Self, ConfigError> {
		let mut config = Self::default();
		let section = match raw_config.get("status_updater") {
			| None | Some(Value::Null) => return Ok(config),
			| Some(Value::Object(map)) => map,
			| Some(_) => {
				return Err(ConfigError::invalid(
					"status_updater",
					"must be an object",
				));
			}
		};
		let get = |key: &str| section.get(key).filter(|v| !v.is_null());

		if let Some(v) = get("update_interval") {
			config.update_interval = seconds_field("update_interval", v)?;
		}
		if let Some(v) = get("position_update_interval") {
			config.position_update_interval =
				seconds_field("position_update_interval", v)?;
		}
		if let Some(v) = get("full_update_interval") {
			config.full_update_interval = seconds_field("full_update_interval", v)?;
		}
		if let Some(v) = get("enabled") {
			config.enabled = bool_field("enabled", v)?;
		}

		if config.update_interval.is_zero() {
			return Err(ConfigError::invalid(
				"update_interval",
				"must be greater than zero",
			));
		}
		Ok(config)
	}
}
