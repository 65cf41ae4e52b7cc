//! Player commands exposed on the commands topic.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::client::Transport;
use crate::message::CommandParams;
use crate::player::{Player, PlayerError};
use crate::routing::{CommandRouter, HandlerError, HandlerResult, WeakCommandRouter};

/// Wire names of the player commands, in registration order.
pub const PLAYER_COMMANDS: [&str; 16] = [
	"play",
	"pause",
	"stop",
	"next",
	"previous",
	"set_volume",
	"get_volume",
	"get_status",
	"get_playlists",
	"play_playlist",
	"set_repeat",
	"set_random",
	"create_playlist",
	"delete_playlist",
	"get_playlist_songs",
	"update_database",
];

type Action = fn(&dyn Player, &CommandParams) -> HandlerResult;

/// Registers a handler for every player command on `router`.
///
/// Parameters are read from the command's `params` by name (`volume`,
/// `repeat`, `random`, `playlist_name`, `files`). After a command succeeds
/// the full player state is published again.
pub fn register_player_commands<T: Transport>(
	router: &CommandRouter<T>,
	player: Arc<dyn Player>,
) {
	for name in PLAYER_COMMANDS {
		let Some(action) = action(name) else {
			continue;
		};
		let player = Arc::clone(&player);
		let weak = router.downgrade();
		router.register_command_handler(name, move |params| {
			let value = action(player.as_ref(), params)?;
			republish_state(&weak, player.as_ref());
			Ok(value)
		});
	}
}

fn action(name: &str) -> Option<Action> {
	let action: Action = match name {
		| "play" => |p, _| done(p.play()),
		| "pause" => |p, _| done(p.pause()),
		| "stop" => |p, _| done(p.stop()),
		| "next" => |p, _| done(p.next()),
		| "previous" => |p, _| done(p.previous()),
		| "set_volume" => |p, params| done(p.set_volume(volume_param(params)?)),
		| "get_volume" => |p, _| Ok(Value::from(p.get_volume()?)),
		| "get_status" => |p, _| to_value(&p.get_status()?),
		| "get_playlists" => |p, _| to_value(&p.get_playlists()?),
		| "play_playlist" => {
			|p, params| done(p.play_playlist(str_param(params, "playlist_name")?))
		}
		| "set_repeat" => |p, params| done(p.set_repeat(bool_param(params, "repeat")?)),
		| "set_random" => |p, params| done(p.set_random(bool_param(params, "random")?)),
		| "create_playlist" => |p, params| {
			let name = str_param(params, "playlist_name")?;
			done(p.create_playlist(name, &files_param(params)?))
		},
		| "delete_playlist" => {
			|p, params| done(p.delete_playlist(str_param(params, "playlist_name")?))
		}
		| "get_playlist_songs" => {
			|p, params| to_value(&p.get_playlist_songs(str_param(params, "playlist_name")?)?)
		}
		| "update_database" => |p, _| done(p.update_database()),
		| _ => return None,
	};
	Some(action)
}

fn republish_state<T: Transport>(router: &WeakCommandRouter<T>, player: &dyn Player) {
	let Some(router) = router.upgrade() else {
		return;
	};
	match player.get_status() {
		| Ok(status) => {
			router.publish_state(status);
		}
		| Err(err) => warn!(error = %err, "Failed to read player state after command"),
	}
}

fn done(result: Result<(), PlayerError>) -> HandlerResult {
	result.map(|()| Value::Bool(true)).map_err(HandlerError::from)
}

fn to_value(value: &impl Serialize) -> HandlerResult {
	serde_json::to_value(value).map_err(|e| HandlerError::failed(e.to_string()))
}

fn param<'a>(params: &'a CommandParams, name: &str) -> Result<&'a Value, HandlerError> {
	params
		.get(name)
		.filter(|v| !v.is_null())
		.ok_or_else(|| HandlerError::missing(name))
}

fn volume_param(params: &CommandParams) -> Result<u8, HandlerError> {
	param(params, "volume")?
		.as_u64()
		.filter(|v| *v <= 100)
		.and_then(|v| u8::try_from(v).ok())
		.ok_or_else(|| HandlerError::invalid("volume", "expected an integer between 0 and 100"))
}

fn bool_param(params: &CommandParams, name: &str) -> Result<bool, HandlerError> {
	param(params, name)?
		.as_bool()
		.ok_or_else(|| HandlerError::invalid(name, "expected a boolean"))
}

fn str_param<'a>(params: &'a CommandParams, name: &str) -> Result<&'a str, HandlerError> {
	param(params, name)?
		.as_str()
		.ok_or_else(|| HandlerError::invalid(name, "expected a string"))
}

fn files_param(params: &CommandParams) -> Result<Vec<String>, HandlerError> {
	let Some(files) = params.get("files").filter(|v| !v.is_null()) else {
		return Ok(Vec::new());
	};
	files
		.as_array()
		.and_then(|items| {
			items
				.iter()
				.map(|item| item.as_str().map(str::to_owned))
				.collect::<Option<Vec<_>>>()
		})
		.ok_or_else(|| HandlerError::invalid("files", "expected a list of strings"))
}
