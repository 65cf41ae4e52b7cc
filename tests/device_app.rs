//! Player commands and lifecycle of the device application.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockTransport, ScriptedPlayer, init_tracing, test_config};
use device_link::app::PLAYER_COMMANDS;
use device_link::{CommandRouter, DeviceApp, Message, TopicKind, Transport};
use serde_json::{Value, json};

fn app(player: Arc<ScriptedPlayer>, status_updates: bool) -> DeviceApp<MockTransport> {
	init_tracing();
	let mut config = test_config();
	config.raw_config = json!({"status_updater": {"enabled": status_updates}});
	let router = CommandRouter::with_transport(config, MockTransport::new()).unwrap();
	DeviceApp::with_router(router, player).unwrap()
}

fn topic(app: &DeviceApp<MockTransport>, kind: TopicKind) -> String {
	app.router().namespace().topic_for(kind).to_string()
}

fn send(app: &DeviceApp<MockTransport>, command: Value) {
	let commands = topic(app, TopicKind::Commands);
	assert!(
		app.router()
			.transport()
			.deliver(&commands, serde_json::to_vec(&command).unwrap())
	);
}

fn last_response(app: &DeviceApp<MockTransport>) -> Value {
	let responses = app
		.router()
		.transport()
		.published_on(&topic(app, TopicKind::Responses));
	responses.last().expect("a response was published").json()
}

#[tokio::test]
async fn test_all_player_commands_registered() {
	let app = app(Arc::new(ScriptedPlayer::new()), false);
	let mut expected: Vec<_> = PLAYER_COMMANDS.iter().map(|c| c.to_string()).collect();
	expected.sort();

	assert_eq!(app.router().registry().names(), expected);
}

#[tokio::test]
async fn test_set_volume_republishes_state() {
	let player = Arc::new(ScriptedPlayer::playing("song.mp3", 3.0));
	let app = app(player.clone(), false);
	app.connect().await.unwrap();
	app.router().transport().clear_published();

	send(
		&app,
		json!({"command": "set_volume", "command_id": "v-1", "params": {"volume": 70}}),
	);

	assert_eq!(player.actions(), ["set_volume:70"]);
	let response = last_response(&app);
	assert_eq!(response["command_id"], json!("v-1"));
	assert_eq!(response["result"], json!(true));
	assert_eq!(response["data"], json!({"result": true}));

	let states = app
		.router()
		.transport()
		.published_on(&topic(&app, TopicKind::State));
	assert_eq!(states.len(), 1);
	match states[0].message() {
		| Message::State(state) => assert_eq!(state.volume, 70),
		| other => panic!("unexpected message {other:?}"),
	}
}

#[tokio::test]
async fn test_parameter_errors() {
	let player = Arc::new(ScriptedPlayer::new());
	let app = app(player.clone(), false);
	app.connect().await.unwrap();

	send(&app, json!({"command": "set_volume"}));
	let response = last_response(&app);
	assert_eq!(response["result"], json!(false));
	assert_eq!(
		response["message"],
		json!("Error executing command: Missing parameter 'volume'")
	);

	send(&app, json!({"command": "set_repeat", "params": {"repeat": "yes"}}));
	assert_eq!(
		last_response(&app)["message"],
		json!("Error executing command: Invalid parameter 'repeat': expected a boolean")
	);
	assert!(player.actions().is_empty());
}

#[tokio::test]
async fn test_player_errors() {
	let player = Arc::new(ScriptedPlayer::new());
	let app = app(player.clone(), false);
	app.connect().await.unwrap();

	send(
		&app,
		json!({"command": "play_playlist", "params": {"playlist_name": "road trip"}}),
	);
	assert_eq!(
		last_response(&app)["message"],
		json!("Error executing command: Playlist 'road trip' not found")
	);

	send(&app, json!({"command": "next"}));
	let response = last_response(&app);
	assert_eq!(response["result"], json!(false));
	assert_eq!(
		response["message"],
		json!("Error executing command: Action 'next' is not supported by this player")
	);
}

#[tokio::test]
async fn test_playlist_commands() {
	let player = Arc::new(ScriptedPlayer::new());
	let app = app(player.clone(), false);
	app.connect().await.unwrap();

	send(
		&app,
		json!({
			"command": "create_playlist",
			"params": {"playlist_name": "mix", "files": ["a.mp3", "b.mp3"]}
		}),
	);
	assert_eq!(last_response(&app)["result"], json!(true));

	send(&app, json!({"command": "get_playlists"}));
	assert_eq!(last_response(&app)["data"], json!({"result": ["mix"]}));

	send(
		&app,
		json!({"command": "play_playlist", "params": {"playlist_name": "mix"}}),
	);
	assert_eq!(last_response(&app)["result"], json!(true));
	assert_eq!(player.actions(), ["play_playlist:mix"]);
}

#[tokio::test]
async fn test_get_status_returns_snapshot() {
	let player = Arc::new(ScriptedPlayer::playing("song.mp3", 12.5));
	let app = app(player, false);
	app.connect().await.unwrap();

	send(&app, json!({"command": "get_status", "command_id": "s"}));

	let data = &last_response(&app)["data"]["result"];
	assert_eq!(data["state"], json!("play"));
	assert_eq!(data["volume"], json!(40));
	assert_eq!(data["current_song"]["position"], json!(12.5));
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_starts_and_stops_status_updates() {
	let player = Arc::new(ScriptedPlayer::playing("song.mp3", 0.0));
	let app = app(player, true);

	app.connect().await.unwrap();
	assert!(app.status_publisher().is_running());
	tokio::time::sleep(Duration::from_millis(1_500)).await;

	app.disconnect().await;
	assert!(!app.status_publisher().is_running());
	assert!(!app.router().is_connected());

	let published = app.router().transport().published();
	assert_eq!(
		published
			.iter()
			.filter(|p| p.topic == topic(&app, TopicKind::State))
			.count(),
		2
	);
	let last = published.last().unwrap();
	assert_eq!(last.topic, topic(&app, TopicKind::Connection));
	assert_eq!(last.json()["status"], json!("offline"));
}

#[tokio::test]
async fn test_disabled_status_updates() {
	let app = app(Arc::new(ScriptedPlayer::new()), false);
	app.connect().await.unwrap();

	assert!(!app.status_publisher().is_running());
	assert!(app.publish_player_state());
}

#[tokio::test(start_paused = true)]
async fn test_status_updates_start_after_late_connect() {
	let player = Arc::new(ScriptedPlayer::playing("song.mp3", 0.0));
	let app = app(player, true);
	app.router().transport().refuse_connections(true);

	assert!(app.connect().await.is_err());
	assert!(!app.status_publisher().is_running());

	// a later reconnect of the transport brings the device online
	app.router().transport().refuse_connections(false);
	app.router().transport().connect().await.unwrap();
	assert!(app.status_publisher().is_running());
	tokio::time::sleep(Duration::from_millis(500)).await;
	let states = app
		.router()
		.transport()
		.published_on(&topic(&app, TopicKind::State));
	assert_eq!(states.len(), 1);
	assert!(states[0].retain);

	app.disconnect().await;
	assert!(!app.status_publisher().is_running());

	// no restart once the app is disconnected
	app.router().transport().connect().await.unwrap();
	assert!(!app.status_publisher().is_running());
}
