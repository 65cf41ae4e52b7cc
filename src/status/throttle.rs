use std::time::Duration;

use tokio::time::Instant;

use super::config::StatusPublisherConfig;
use crate::message::PlaybackState;
use crate::player::PlayerStatus;

/// What a poll of the player should publish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateDecision {
	/// The whole status, through the state observers
	Full,
	/// Only the playback position of the current song
	Position(f64),
	/// Nothing changed enough to publish
	Skip,
}

/// Decides between full, position-only and no update for each poll.
///
/// Rules, first match wins:
/// 1. the full update interval has elapsed: full update;
/// 2. playing and the position interval has elapsed: position update
///    (full update when there is no current song);
/// 3. playback state, song file, volume, repeat or random changed since the
///    previous poll: full update;
/// 4. first poll: full update.
///
/// The periodic full update is checked first so a player that stays in
/// `play` still gets complete snapshots.
#[derive(Debug)]
pub struct StatusThrottle {
	position_update_interval: Duration,
	full_update_interval: Duration,
	last_full_update: Option<Instant>,
	last_position_update: Option<Instant>,
	last_status: Option<PlayerStatus>,
}

impl StatusThrottle {
	pub fn new(config: &StatusPublisherConfig) -> Self {
		Self {
			position_update_interval: config.position_update_interval,
			full_update_interval: config.full_update_interval,
			last_full_update: None,
			last_position_update: None,
			last_status: None,
		}
	}

	/// Classifies `status` polled at `now` and records it as the previous
	/// status.
	pub fn decide(&mut self, status: &PlayerStatus, now: Instant) -> UpdateDecision {
		let decision = self.classify(status, now);
		self.last_status = Some(status.clone());
		decision
	}

	pub fn last_status(&self) -> Option<&PlayerStatus> {
		self.last_status.as_ref()
	}

	fn classify(&mut self, status: &PlayerStatus, now: Instant) -> UpdateDecision {
		if elapsed(self.last_full_update, now, self.full_update_interval) {
			self.last_full_update = Some(now);
			return UpdateDecision::Full;
		}

		if status.state == PlaybackState::Play
			&& elapsed(self.last_position_update, now, self.position_update_interval)
		{
			self.last_position_update = Some(now);
			return match &status.current_song {
				| Some(song) => UpdateDecision::Position(song.position.unwrap_or(0.0)),
				| None => UpdateDecision::Full,
			};
		}

		match &self.last_status {
			| Some(last) if has_changed(last, status) => UpdateDecision::Full,
			| Some(_) => UpdateDecision::Skip,
			| None => UpdateDecision::Full,
		}
	}
}

fn elapsed(since: Option<Instant>, now: Instant, interval: Duration) -> bool {
	since.is_none_or(|at| now.saturating_duration_since(at) >= interval)
}

fn has_changed(last: &PlayerStatus, current: &PlayerStatus) -> bool {
	last.state != current.state
		|| last.song_file() != current.song_file()
		|| last.volume != current.volume
		|| last.repeat != current.repeat
		|| last.random != current.random
}
