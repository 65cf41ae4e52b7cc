//! Configuration for the broker connection

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rumqttc::tokio_rustls::rustls::{ClientConfig, RootCertStore};
use rumqttc::{MqttOptions, QoS, Transport};
use serde_json::Value;
use thiserror::Error;

/// Configuration faults, raised before any connection attempt.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// A required field is missing or empty
	#[error("Missing required configuration value: {0}")]
	Missing(&'static str),

	/// A field has the wrong type or an out of range value
	#[error("Invalid configuration value for '{field}': {reason}")]
	Invalid {
		/// Offending field
		field: &'static str,
		/// What is wrong with it
		reason: String,
	},

	/// TLS material could not be read or parsed
	#[error("TLS configuration error ({path}): {reason}")]
	Tls {
		/// File being loaded
		path: String,
		/// What went wrong
		reason: String,
	},
}

impl ConfigError {
	pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
		Self::Invalid {
			field,
			reason: reason.into(),
		}
	}

	fn tls(path: &Path, reason: impl ToString) -> Self {
		Self::Tls {
			path: path.display().to_string(),
			reason: reason.to_string(),
		}
	}
}

/// Converts an MQTT QoS level (0, 1 or 2).
pub fn qos_from_level(level: u64) -> Result<QoS, ConfigError> {
	match level {
		| 0 => Ok(QoS::AtMostOnce),
		| 1 => Ok(QoS::AtLeastOnce),
		| 2 => Ok(QoS::ExactlyOnce),
		| other => Err(ConfigError::invalid(
			"default_qos",
			format!("{other} is not a QoS level"),
		)),
	}
}

/// Numeric MQTT level of a QoS.
pub fn qos_level(qos: QoS) -> u8 {
	match qos {
		| QoS::AtMostOnce => 0,
		| QoS::AtLeastOnce => 1,
		| QoS::ExactlyOnce => 2,
	}
}

/// Session options of the broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
	pub use_tls: bool,
	/// Client certificate (PEM), used together with `key_file`
	pub cert_file: Option<PathBuf>,
	/// Client private key (PEM)
	pub key_file: Option<PathBuf>,
	/// CA bundle (PEM); the platform roots are used when absent
	pub ca_file: Option<PathBuf>,
	pub username: Option<String>,
	pub password: Option<String>,
	pub keep_alive: Duration,
	pub clean_session: bool,
	/// Retry with exponential backoff after a failed or lost connection
	pub reconnect_on_failure: bool,
	/// Upper bound of the reconnect backoff
	pub max_reconnect_delay: Duration,
}

impl Default for ConnectionOptions {
	fn default() -> Self {
		Self {
			use_tls: true,
			cert_file: None,
			key_file: None,
			ca_file: None,
			username: None,
			password: None,
			keep_alive: Duration::from_secs(60),
			clean_session: true,
			reconnect_on_failure: true,
			max_reconnect_delay: Duration::from_secs(300),
		}
	}
}

/// Client-level behaviour settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// Capacity of the request channel between the client and its event loop
	pub event_loop_capacity: usize,
	/// Capacity of the channel between the event loop and the dispatcher
	/// running subscription callbacks
	pub inbound_channel_capacity: usize,
	/// Time allowed for the initial CONNECT/CONNACK exchange
	pub connection_timeout_millis: u64,
	/// Time `disconnect()` waits for the event loop before aborting it
	pub shutdown_timeout_millis: u64,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			event_loop_capacity: 10,
			inbound_channel_capacity: 100,
			connection_timeout_millis: 5000,
			shutdown_timeout_millis: 2000,
		}
	}
}

/// Broker configuration, created once at startup.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
	/// Broker host name
	pub host: String,
	pub port: u16,
	pub client_id: String,
	pub device_id: String,
	pub topic_prefix: String,
	pub options: ConnectionOptions,
	pub default_qos: QoS,
	/// The whole configuration document, carrying the sections of other
	/// components (e.g. `status_updater`)
	pub raw_config: Value,
}

impl BrokerConfig {
	/// Default broker port (MQTT over TLS)
	pub const DEFAULT_PORT: u16 = 8883;
	/// Default topic prefix
	pub const DEFAULT_TOPIC_PREFIX: &'static str = "amora/devices";

	/// Creates a config with default options for `device_id` on `host`.
	pub fn new(host: impl Into<String>, device_id: impl Into<String>) -> Self {
		let device_id = device_id.into();
		Self {
			host: host.into(),
			port: Self::DEFAULT_PORT,
			client_id: format!("device-{device_id}"),
			device_id,
			topic_prefix: Self::DEFAULT_TOPIC_PREFIX.to_string(),
			options: ConnectionOptions::default(),
			default_qos: QoS::AtLeastOnce,
			raw_config: Value::Null,
		}
	}

	/// Reads the `broker` and `device` sections of a configuration document.
	///
	/// ```json
	/// {
	///   "broker": {"broker_url": "mqtt.example.com", "port": 8883},
	///   "device": {"id": "kitchen"}
	/// }
	/// ```
	///
	/// Absent fields take their defaults; the result is validated.
	pub fn from_value(config: &Value) -> Result<Self, ConfigError> {
		let empty = serde_json::Map::new();
		let broker = match config.get("broker") {
			| None => &empty,
			| Some(Value::Object(map)) => map,
			| Some(_) => {
				return Err(ConfigError::invalid("broker", "must be an object"));
			}
		};
		let device_id = config
			.get("device")
			.and_then(|d| d.get("id"))
			.map(|v| string_field("device.id", v))
			.transpose()?
			.unwrap_or_default();
		let get = |key: &str| broker.get(key).filter(|v| !v.is_null());

		let mut result = Self::new(
			get("broker_url")
				.map(|v| string_field("broker_url", v))
				.transpose()?
				.unwrap_or_default(),
			device_id,
		);
		if let Some(port) = get("port") {
			result.port = port
				.as_u64()
				.and_then(|p| u16::try_from(p).ok())
				.ok_or_else(|| ConfigError::invalid("port", "not a port number"))?;
		}
		if let Some(client_id) = get("client_id") {
			result.client_id = string_field("client_id", client_id)?;
		}
		if let Some(prefix) = get("topic_prefix") {
			result.topic_prefix = string_field("topic_prefix", prefix)?;
		}
		if let Some(qos) = get("default_qos") {
			let level = qos
				.as_u64()
				.ok_or_else(|| ConfigError::invalid("default_qos", "not an integer"))?;
			result.default_qos = qos_from_level(level)?;
		}

		let options = &mut result.options;
		if let Some(v) = get("use_tls") {
			options.use_tls = bool_field("use_tls", v)?;
		}
		options.cert_file = get("cert_file")
			.map(|v| string_field("cert_file", v).map(PathBuf::from))
			.transpose()?;
		options.key_file = get("key_file")
			.map(|v| string_field("key_file", v).map(PathBuf::from))
			.transpose()?;
		options.ca_file = get("ca_file")
			.map(|v| string_field("ca_file", v).map(PathBuf::from))
			.transpose()?;
		options.username = get("username")
			.map(|v| string_field("username", v))
			.transpose()?;
		options.password = get("password")
			.map(|v| string_field("password", v))
			.transpose()?;
		if let Some(v) = get("keep_alive") {
			options.keep_alive = seconds_field("keep_alive", v)?;
		}
		if let Some(v) = get("clean_session") {
			options.clean_session = bool_field("clean_session", v)?;
		}
		if let Some(v) = get("reconnect_on_failure") {
			options.reconnect_on_failure = bool_field("reconnect_on_failure", v)?;
		}
		if let Some(v) = get("max_reconnect_delay") {
			options.max_reconnect_delay = seconds_field("max_reconnect_delay", v)?;
		}

		result.raw_config = config.clone();
		result.validate()?;
		Ok(result)
	}

	/// Rejects configurations that cannot produce a connection.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.host.trim().is_empty() {
			return Err(ConfigError::Missing("broker.broker_url"));
		}
		if self.device_id.trim().is_empty() {
			return Err(ConfigError::Missing("device.id"));
		}
		if self.client_id.is_empty() {
			return Err(ConfigError::Missing("broker.client_id"));
		}
		if self.options.cert_file.is_some() != self.options.key_file.is_some() {
			return Err(ConfigError::invalid(
				"cert_file",
				"cert_file and key_file must be given together",
			));
		}
		let keep_alive = self.options.keep_alive;
		if !keep_alive.is_zero() && keep_alive < Duration::from_secs(1) {
			return Err(ConfigError::invalid(
				"keep_alive",
				"must be zero or at least one second",
			));
		}
		Ok(())
	}

	/// Builds the `rumqttc` options for this configuration.
	///
	/// TLS material is read from disk here, so a missing certificate fails
	/// at construction rather than at connect time.
	pub fn mqtt_options(&self) -> Result<MqttOptions, ConfigError> {
		self.validate()?;
		let mut mqtt = MqttOptions::new(&self.client_id, &self.host, self.port);
		mqtt.set_keep_alive(self.options.keep_alive);
		mqtt.set_clean_session(self.options.clean_session);
		if let (Some(username), Some(password)) =
			(&self.options.username, &self.options.password)
		{
			mqtt.set_credentials(username, password);
		}
		if self.options.use_tls {
			mqtt.set_transport(self.tls_transport()?);
		}
		Ok(mqtt)
	}

	fn tls_transport(&self) -> Result<Transport, ConfigError> {
		let Some(ca_file) = &self.options.ca_file else {
			if self.options.cert_file.is_some() {
				return Err(ConfigError::invalid(
					"ca_file",
					"client certificates require a CA file",
				));
			}
			return Ok(Transport::tls_with_default_config());
		};

		let mut root_cert_store = RootCertStore::empty();
		for cert in rustls_pemfile::certs(&mut open_pem(ca_file)?) {
			let cert = cert.map_err(|e| ConfigError::tls(ca_file, e))?;
			root_cert_store
				.add(cert)
				.map_err(|e| ConfigError::tls(ca_file, e))?;
		}
		if root_cert_store.is_empty() {
			return Err(ConfigError::tls(ca_file, "no certificates found"));
		}

		let builder = ClientConfig::builder().with_root_certificates(root_cert_store);
		let tls_config = match (&self.options.cert_file, &self.options.key_file) {
			| (Some(cert_file), Some(key_file)) => {
				let certs = rustls_pemfile::certs(&mut open_pem(cert_file)?)
					.collect::<Result<Vec<_>, _>>()
					.map_err(|e| ConfigError::tls(cert_file, e))?;
				let key = rustls_pemfile::private_key(&mut open_pem(key_file)?)
					.map_err(|e| ConfigError::tls(key_file, e))?
					.ok_or_else(|| ConfigError::tls(key_file, "no private key found"))?;
				builder
					.with_client_auth_cert(certs, key)
					.map_err(|e| ConfigError::tls(cert_file, e))?
			}
			| _ => builder.with_no_client_auth(),
		};
		Ok(Transport::tls_with_config(tls_config.into()))
	}
}

fn open_pem(path: &Path) -> Result<BufReader<File>, ConfigError> {
	File::open(path)
		.map(BufReader::new)
		.map_err(|e| ConfigError::tls(path, e))
}

fn string_field(field: &'static str, value: &Value) -> Result<String, ConfigError> {
	match value {
		| Value::String(s) => Ok(s.clone()),
		| Value::Number(n) => Ok(n.to_string()),
		| _ => Err(ConfigError::invalid(field, "expected a string")),
	}
}

pub(crate) fn bool_field(field: &'static str, value: &Value) -> Result<bool, ConfigError> {
	value
		.as_bool()
		.ok_or_else(|| ConfigError::invalid(field, "expected a boolean"))
}

pub(crate) fn seconds_field(
	field: &'static str,
	value: &Value,
) -> Result<Duration, ConfigError> {
	value
		.as_f64()
		.filter(|s| s.is_finite() && *s >= 0.0)
		.map(Duration::from_secs_f64)
		.ok_or_else(|| ConfigError::invalid(field, "expected a non-negative number of seconds"))
}
