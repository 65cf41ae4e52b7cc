//! Player state messages.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{MessageKind, WireMessage, now_timestamp};

/// Playback state reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
	/// Playing
	Play,
	/// Paused
	Pause,
	/// Stopped
	Stop,
	/// Player backend unreachable
	Disconnected,
	/// Player reported an error
	Error,
	/// Anything else, including a missing state
	#[default]
	Unknown,
}

impl PlaybackState {
	/// Wire name of the state.
	pub fn as_str(&self) -> &'static str {
		match self {
			| PlaybackState::Play => "play",
			| PlaybackState::Pause => "pause",
			| PlaybackState::Stop => "stop",
			| PlaybackState::Disconnected => "disconnected",
			| PlaybackState::Error => "error",
			| PlaybackState::Unknown => "unknown",
		}
	}

	/// Parses a wire name; unrecognised names map to `Unknown`.
	pub fn from_name(name: &str) -> Self {
		match name {
			| "play" => PlaybackState::Play,
			| "pause" => PlaybackState::Pause,
			| "stop" => PlaybackState::Stop,
			| "disconnected" => PlaybackState::Disconnected,
			| "error" => PlaybackState::Error,
			| _ => PlaybackState::Unknown,
		}
	}

	/// True while audio is playing.
	pub fn is_playing(&self) -> bool {
		matches!(self, PlaybackState::Play)
	}
}

impl fmt::Display for PlaybackState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for PlaybackState {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for PlaybackState {
	fn deserialize<D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Self, D::Error> {
		let name = Option::<String>::deserialize(deserializer)?;
		Ok(name.as_deref().map(Self::from_name).unwrap_or_default())
	}
}

/// Track currently loaded in the player.
///
/// Fields the player reports beyond the known ones are kept in `extra`
/// and written back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SongInfo {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub artist: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub album: Option<String>,
	/// Path of the audio file, the identity of the track
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file: Option<String>,
	/// Track length in seconds
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration: Option<f64>,
	/// Playback position in seconds
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub position: Option<f64>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Full player state snapshot, published retained on the state topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
	#[serde(default)]
	pub state: PlaybackState,
	#[serde(default)]
	pub current_song: Option<SongInfo>,
	/// Volume, 0 to 100
	#[serde(default)]
	pub volume: u8,
	#[serde(default)]
	pub repeat: bool,
	#[serde(default)]
	pub random: bool,
	#[serde(default)]
	pub playlist: Option<String>,
	#[serde(default)]
	pub playlist_tracks: Option<Vec<Value>>,
	#[serde(default = "now_timestamp")]
	pub timestamp: f64,
}

impl Default for StateMessage {
	fn default() -> Self {
		Self {
			state: PlaybackState::Unknown,
			current_song: None,
			volume: 0,
			repeat: false,
			random: false,
			playlist: None,
			playlist_tracks: None,
			timestamp: now_timestamp(),
		}
	}
}

impl StateMessage {
	/// Converts a raw player snapshot field by field.
	///
	/// Missing or mistyped fields fall back to their defaults instead of
	/// failing the whole conversion; volume is clamped to 0..=100.
	pub fn from_player_state(snapshot: &Map<String, Value>) -> Self {
		let state = snapshot
			.get("state")
			.and_then(Value::as_str)
			.map(PlaybackState::from_name)
			.unwrap_or_default();
		let current_song = snapshot
			.get("current_song")
			.filter(|v| v.is_object())
			.and_then(|v| serde_json::from_value(v.clone()).ok());
		let volume = snapshot
			.get("volume")
			.and_then(|v| v.as_f64())
			.map(|v| v.clamp(0.0, 100.0) as u8)
			.unwrap_or(0);
		let flag = |key: &str| {
			snapshot.get(key).and_then(Value::as_bool).unwrap_or(false)
		};
		let playlist = snapshot
			.get("playlist")
			.and_then(Value::as_str)
			.map(str::to_owned);
		let playlist_tracks = snapshot
			.get("playlist_tracks")
			.and_then(Value::as_array)
			.cloned();

		Self {
			state,
			current_song,
			volume,
			repeat: flag("repeat"),
			random: flag("random"),
			playlist,
			playlist_tracks,
			timestamp: now_timestamp(),
		}
	}

	/// File path of the current song, if any.
	pub fn song_file(&self) -> Option<&str> {
		self.current_song.as_ref().and_then(|s| s.file.as_deref())
	}
}

impl WireMessage for StateMessage {
	const KIND: MessageKind = MessageKind::State;
}

impl From<Map<String, Value>> for StateMessage {
	fn from(snapshot: Map<String, Value>) -> Self {
		Self::from_player_state(&snapshot)
	}
}

impl From<&Map<String, Value>> for StateMessage {
	fn from(snapshot: &Map<String, Value>) -> Self {
		Self::from_player_state(snapshot)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn snapshot(value: Value) -> Map<String, Value> {
		value.as_object().cloned().unwrap()
	}

	#[test]
	fn test_from_player_state() {
		let state = StateMessage::from_player_state(&snapshot(json!({
			"state": "play",
			"volume": 50,
			"repeat": true,
			"random": false,
			"playlist": "favourites",
			"current_song": {
				"title": "Song",
				"artist": "Artist",
				"file": "music/song.mp3",
				"duration": 180.0,
				"position": 12.5,
				"id": "7"
			}
		})));

		assert_eq!(state.state, PlaybackState::Play);
		assert_eq!(state.volume, 50);
		assert!(state.repeat);
		assert!(!state.random);
		assert_eq!(state.playlist.as_deref(), Some("favourites"));
		assert_eq!(state.song_file(), Some("music/song.mp3"));
		let song = state.current_song.unwrap();
		assert_eq!(song.position, Some(12.5));
		assert_eq!(song.extra.get("id"), Some(&json!("7")));
	}

	#[test]
	fn test_from_player_state_defaults() {
		let state =
			StateMessage::from_player_state(&snapshot(json!({"volume": 250})));

		assert_eq!(state.state, PlaybackState::Unknown);
		assert_eq!(state.volume, 100);
		assert!(state.current_song.is_none());
		assert!(!state.repeat);
	}

	#[test]
	fn test_unknown_state_name_decodes_to_unknown() {
		let state =
			StateMessage::from_json(r#"{"state": "buffering", "volume": 3}"#)
				.unwrap();
		assert_eq!(state.state, PlaybackState::Unknown);
		assert_eq!(state.volume, 3);

		let state = StateMessage::from_json(r#"{"state": null}"#).unwrap();
		assert_eq!(state.state, PlaybackState::Unknown);
	}

	#[test]
	fn test_encoding_keeps_wire_names() {
		let state = StateMessage {
			state: PlaybackState::Pause,
			volume: 20,
			timestamp: 1_700_000_000.0,
			..StateMessage::default()
		};
		let value: Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();

		assert_eq!(value["state"], json!("pause"));
		assert_eq!(value["volume"], json!(20));
		assert_eq!(value["current_song"], Value::Null);
		assert_eq!(value["timestamp"], json!(1_700_000_000.0));
	}
}
