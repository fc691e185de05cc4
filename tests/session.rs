mod common;

use common::session;
use remote_dom::{ChannelState, Config, Diagnostic, EventDetails, Received};
use serde_json::json;

fn tree_frame() -> String {
	json!({
		"title": "Hello",
		"body": { "id": "root", "tag": "div", "children": [{ "id": "1-0", "tag": "button", "events": ["click"] }] },
	})
	.to_string()
}

#[test]
fn handshake_carries_the_session_token() {
	let (mut session, outbox) = session(Config::new().with_session_token("s3cr3t"));
	assert_eq!(session.state(), ChannelState::Connecting);

	assert_eq!(session.on_open(), Ok(true));
	assert_eq!(session.state(), ChannelState::Open);
	assert_eq!(outbox.frames(), ["init+s3cr3t"]);

	// Opening again doesn't repeat the handshake.
	assert_eq!(session.on_open(), Ok(false));
	assert_eq!(outbox.frames().len(), 1);
}

#[test]
fn open_after_close_is_ignored() {
	let (mut session, outbox) = session(Config::new());
	session.on_close();
	assert_eq!(session.on_open(), Ok(false));
	assert_eq!(session.state(), ChannelState::Closed);
	assert!(outbox.frames().is_empty());
}

#[test]
fn keep_alive_only_while_open() {
	let (mut session, outbox) = session(Config::new());
	assert!(!session.on_keep_alive_tick());

	session.on_open().unwrap();
	assert!(session.on_keep_alive_tick());
	assert_eq!(outbox.frames(), ["init+", "ping"]);

	session.on_close();
	assert!(!session.on_keep_alive_tick());
	assert_eq!(outbox.frames().len(), 2);
}

#[test]
fn keep_alive_ack_is_consumed() {
	let (mut session, _) = session(Config::new().with_debug(true));
	session.on_open().unwrap();
	assert_eq!(session.on_frame("pong"), Received::KeepAliveAck);
	assert!(session.recorder().is_empty());
	assert!(session.tree().registry().is_empty());
}

#[test]
fn tree_and_title() {
	let (mut session, _) = session(Config::new());
	session.on_open().unwrap();

	assert_eq!(session.on_frame(&tree_frame()), Received::Tree);
	assert_eq!(session.tree().dom().title(), "Hello");
	assert!(session.tree().lookup("1-0").is_some());
}

#[test]
fn batches_are_applied_in_order() {
	let (mut session, _) = session(Config::new());
	session.on_open().unwrap();
	session.on_frame(&tree_frame());

	let frame = json!({
		"title": "Updated",
		"diff": [
			{ "action": "updatetext", "selector": "1-0", "value": "Save" },
			{ "action": "delete", "selector": "1-9" },
			{ "action": "updateproperties", "selector": "1-0", "properties": { "class": "primary" } },
		],
	});
	match session.on_frame(&frame.to_string()) {
		Received::Batch(report) => {
			assert_eq!(report.applied, 2);
			assert_eq!(report.skipped(), 1);
		}
		other => panic!("unexpected {:?}", other),
	}
	assert_eq!(session.tree().dom().title(), "Updated");
	assert_eq!(session.tree().snapshot(), r#"<div id="root"><button id="1-0" data-event="click" class="primary">Save</button></div>"#);
}

#[test]
fn undecodable_frames_are_rejected() {
	let (mut session, _) = session(Config::new());
	session.on_open().unwrap();

	assert!(matches!(session.on_frame("not json"), Received::Rejected(Diagnostic::Decode { .. })));
	assert!(matches!(session.on_frame("[1, 2]"), Received::Rejected(Diagnostic::Decode { .. })));
	assert!(matches!(session.on_frame(r#"{"diff": {}}"#), Received::Rejected(Diagnostic::Decode { .. })));
	assert!(matches!(session.on_frame(r#"{"title": "Only"}"#), Received::Rejected(Diagnostic::Decode { .. })));

	// The session keeps working.
	assert_eq!(session.on_frame(&tree_frame()), Received::Tree);
}

#[test]
fn transport_failure_closes_the_channel() {
	let (mut session, _) = session(Config::new());
	session.on_open().unwrap();
	session.on_error("connection reset");

	assert_eq!(session.state(), ChannelState::Closed);
	assert_eq!(session.on_frame(&tree_frame()), Received::Discarded);
	assert!(session.tree().registry().is_empty());
}

#[test]
fn handshake_failure_is_reported() {
	let (mut session, outbox) = session(Config::new());
	outbox.close();
	assert!(matches!(session.on_open(), Err(Diagnostic::Transport(_))));
	assert_eq!(session.state(), ChannelState::Open);
}

#[test]
fn interactions_flow_back_through_the_transport() {
	let (mut session, outbox) = session(Config::new());
	session.on_open().unwrap();
	session.on_frame(&tree_frame());

	let button = *session.tree().lookup("1-0").unwrap();
	session.tree().dom().dispatch(button, "click", &EventDetails::pointer(10, 20));
	assert_eq!(outbox.last_json(), json!({ "handler": [1, 0], "name": "click", "payload": { "x": 10, "y": 20 } }));
}

#[test]
fn declared_events_can_be_rebound_after_each_message() {
	let change = json!({ "diff": [{ "action": "updateevents", "selector": "1-0", "value": ["click", "mouseover"] }] }).to_string();

	let (mut literal, _) = session(Config::new());
	literal.on_frame(&tree_frame());
	literal.on_frame(&change);
	let button = *literal.tree().lookup("1-0").unwrap();
	assert_eq!(literal.tree().dom().listener_count(button, "mouseover"), 0);

	let (mut rebinding, _) = session(Config::new().with_rebind_declared_events(true));
	rebinding.on_frame(&tree_frame());
	rebinding.on_frame(&change);
	let button = *rebinding.tree().lookup("1-0").unwrap();
	assert_eq!(rebinding.tree().dom().listener_count(button, "mouseover"), 1);
}
