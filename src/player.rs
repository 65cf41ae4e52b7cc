//! Boundary to the music player driven by the device.
//!
//! The player itself lives outside this crate; the link only needs its
//! status snapshot and a closed set of actions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::message::{PlaybackState, SongInfo, StateMessage};

/// Failures reported by a player.
#[derive(Debug, Error)]
pub enum PlayerError {
	/// The player does not implement this action
	#[error("Action '{0}' is not supported by this player")]
	Unsupported(&'static str),

	/// The player backend cannot be reached
	#[error("Player is not connected")]
	NotConnected,

	/// The named playlist does not exist
	#[error("Playlist '{0}' not found")]
	PlaylistNotFound(String),

	/// Any other backend failure
	#[error("Player error: {0}")]
	Backend(String),
}

/// Snapshot returned by [`Player::get_status`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerStatus {
	#[serde(default)]
	pub state: PlaybackState,
	#[serde(default)]
	pub current_song: Option<SongInfo>,
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
}

impl PlayerStatus {
	/// File path of the current song, if any.
	pub fn song_file(&self) -> Option<&str> {
		self.current_song.as_ref().and_then(|s| s.file.as_deref())
	}

	/// Playback position of the current song, if known.
	pub fn position(&self) -> Option<f64> {
		self.current_song.as_ref().and_then(|s| s.position)
	}

	/// Raw key-value form, as published for a full update.
	pub fn to_map(&self) -> Map<String, Value> {
		match serde_json::to_value(self) {
			| Ok(Value::Object(map)) => map,
			| _ => Map::new(),
		}
	}
}

impl From<&PlayerStatus> for StateMessage {
	fn from(status: &PlayerStatus) -> Self {
		StateMessage {
			state: status.state,
			current_song: status.current_song.clone(),
			volume: status.volume.min(100),
			repeat: status.repeat,
			random: status.random,
			playlist: status.playlist.clone(),
			playlist_tracks: status.playlist_tracks.clone(),
			..StateMessage::default()
		}
	}
}

impl From<PlayerStatus> for StateMessage {
	fn from(status: PlayerStatus) -> Self {
		StateMessage::from(&status)
	}
}

/// Music player controlled through device commands.
///
/// Only [`get_status`](Player::get_status) is required. Every action has a
/// default implementation returning [`PlayerError::Unsupported`], so a
/// player implements the subset it offers.
pub trait Player: Send + Sync + 'static {
	fn get_status(&self) -> Result<PlayerStatus, PlayerError>;

	fn play(&self) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("play"))
	}

	fn pause(&self) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("pause"))
	}

	fn stop(&self) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("stop"))
	}

	fn next(&self) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("next"))
	}

	fn previous(&self) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("previous"))
	}

	/// Sets the volume, 0 to 100.
	fn set_volume(&self, _volume: u8) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("set_volume"))
	}

	fn get_volume(&self) -> Result<u8, PlayerError> {
		self.get_status().map(|status| status.volume)
	}

	fn set_repeat(&self, _repeat: bool) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("set_repeat"))
	}

	fn set_random(&self, _random: bool) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("set_random"))
	}

	/// Names of the stored playlists.
	fn get_playlists(&self) -> Result<Vec<String>, PlayerError> {
		Err(PlayerError::Unsupported("get_playlists"))
	}

	fn play_playlist(&self, _name: &str) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("play_playlist"))
	}

	/// Songs of a stored playlist.
	fn get_playlist_songs(&self, _name: &str) -> Result<Vec<SongInfo>, PlayerError> {
		Err(PlayerError::Unsupported("get_playlist_songs"))
	}

	/// Stores a playlist made of the given files.
	fn create_playlist(&self, _name: &str, _files: &[String]) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("create_playlist"))
	}

	fn delete_playlist(&self, _name: &str) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("delete_playlist"))
	}

	/// Rescans the music library.
	fn update_database(&self) -> Result<(), PlayerError> {
		Err(PlayerError::Unsupported("update_database"))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	struct StatusOnly;

	impl Player for StatusOnly {
		fn get_status(&self) -> Result<PlayerStatus, PlayerError> {
			Ok(PlayerStatus {
				state: PlaybackState::Pause,
				volume: 35,
				..PlayerStatus::default()
			})
		}
	}

	#[test]
	fn test_default_actions_are_unsupported() {
		let player = StatusOnly;

		assert!(matches!(player.play(), Err(PlayerError::Unsupported("play"))));
		assert!(matches!(
			player.play_playlist("x"),
			Err(PlayerError::Unsupported("play_playlist"))
		));
		assert_eq!(player.get_volume().unwrap(), 35);
	}

	#[test]
	fn test_status_to_state_message() {
		let status = PlayerStatus {
			state: PlaybackState::Play,
			current_song: Some(SongInfo {
				file: Some("a.mp3".into()),
				position: Some(3.0),
				..SongInfo::default()
			}),
			volume: 80,
			repeat: true,
			..PlayerStatus::default()
		};
		let state = StateMessage::from(&status);

		assert_eq!(state.state, PlaybackState::Play);
		assert_eq!(state.song_file(), Some("a.mp3"));
		assert_eq!(state.volume, 80);
		assert!(state.repeat);
		assert_eq!(status.position(), Some(3.0));
	}

	#[test]
	fn test_status_map_round_trips_through_state_conversion() {
		let status = PlayerStatus {
			state: PlaybackState::Stop,
			volume: 50,
			random: true,
			playlist: Some("mix".into()),
			..PlayerStatus::default()
		};
		let map = status.to_map();

		assert_eq!(map["state"], json!("stop"));
		assert_eq!(map["volume"], json!(50));
		let state = StateMessage::from_player_state(&map);
		assert_eq!(state.volume, 50);
		assert!(state.random);
		assert_eq!(state.playlist.as_deref(), Some("mix"));
	}
}
