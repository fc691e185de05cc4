mod common;

use common::{node, tree_with};
use remote_dom::{bridge::payload_for, EventDetails};
use serde_json::json;

fn clickable() -> serde_json::Value {
	json!({
		"id": "root",
		"tag": "div",
		"events": ["click"],
		"children": [
			{ "id": "1-0", "tag": "button", "events": ["click", "click", ""] },
			{ "id": "name", "tag": "input", "events": ["input", "focus"] },
		],
	})
}

#[test]
fn click_reports_coordinates_and_path() {
	let (tree, outbox) = tree_with(clickable());
	let button = node(&tree, "1-0");

	assert_eq!(tree.dom().dispatch(button, "click", &EventDetails::pointer(3, 4)), 1);
	assert_eq!(outbox.last_json(), json!({ "handler": [1, 0], "name": "click", "payload": { "x": 3, "y": 4 } }));

	tree.dom().dispatch(node(&tree, "root"), "click", &EventDetails::pointer(0, 0));
	assert_eq!(outbox.last_json()["handler"], json!("root"));
}

#[test]
fn input_reports_value() {
	let (tree, outbox) = tree_with(clickable());
	let input = node(&tree, "name");

	tree.dom().dispatch(input, "input", &EventDetails::value("hey"));
	assert_eq!(outbox.last_json(), json!({ "handler": "name", "name": "input", "payload": { "value": "hey" } }));

	tree.dom().dispatch(input, "focus", &EventDetails::default());
	assert_eq!(outbox.last_json()["payload"], json!({}));
}

#[test]
fn declared_events_are_deduplicated() {
	let (tree, _) = tree_with(clickable());
	let button = node(&tree, "1-0");
	assert_eq!(tree.dom().listener_count(button, "click"), 1);
	assert_eq!(tree.dom().attribute(button, "data-event"), Some("click"));
	assert_eq!(tree.listeners().len(), 4);
}

#[test]
fn binding_twice_is_a_no_op() {
	let (mut tree, _) = tree_with(clickable());
	let button = node(&tree, "1-0");

	assert!(!tree.bind(&button, "click", "1-0"));
	assert_eq!(tree.dom().listener_count(button, "click"), 1);

	assert!(tree.bind(&button, "mouseover", "1-0"));
	assert!(!tree.bind(&button, "mouseover", "1-0"));
	assert_eq!(tree.dom().listener_count(button, "mouseover"), 1);
}

#[test]
fn unbinding_twice_is_a_no_op() {
	let (mut tree, outbox) = tree_with(clickable());
	let button = node(&tree, "1-0");

	assert!(tree.unbind("1-0", "click"));
	assert!(!tree.unbind("1-0", "click"));
	assert!(!tree.unbind("nope", "click"));
	assert_eq!(tree.dom().dispatch(button, "click", &EventDetails::pointer(1, 1)), 0);
	assert!(outbox.frames().is_empty());
}

#[test]
fn repeated_updateevents_removal_is_idempotent() {
	let (mut tree, _) = tree_with(clickable());
	let input = node(&tree, "name");
	let change = json!({ "action": "updateevents", "selector": "name", "remove": ["focus"], "value": ["input"] });

	for _ in 0..2 {
		let report = tree.apply_batch(vec![change.clone()]);
		assert_eq!(report.applied, 1);
		assert!(report.diagnostics.is_empty());
	}
	assert_eq!(tree.dom().listener_count(input, "focus"), 0);
	assert_eq!(tree.dom().listener_count(input, "input"), 1);
	assert_eq!(tree.dom().attribute(input, "data-event"), Some("input"));
}

#[test]
fn updateevents_does_not_bind_new_names() {
	let (mut tree, _) = tree_with(clickable());
	let button = node(&tree, "1-0");

	tree.apply_batch(vec![json!({ "action": "updateevents", "selector": "1-0", "value": ["click", "dblclick"] })]);
	assert_eq!(tree.dom().listener_count(button, "dblclick"), 0);
	assert_eq!(tree.dom().attribute(button, "data-event"), Some("click,dblclick"));
	assert_eq!(tree.registry().events(tree.registry().key_of("1-0").unwrap()), ["click", "dblclick"]);

	// Names that were already bound stay bound.
	assert_eq!(tree.dom().listener_count(button, "click"), 1);

	assert_eq!(tree.bind_declared_events(), 1);
	assert_eq!(tree.dom().listener_count(button, "dblclick"), 1);
	assert_eq!(tree.bind_declared_events(), 0);
}

#[test]
fn closed_transport_drops_interactions() {
	let (tree, outbox) = tree_with(clickable());
	outbox.close();
	assert_eq!(tree.dom().dispatch(node(&tree, "1-0"), "click", &EventDetails::pointer(1, 2)), 1);
	assert!(outbox.frames().is_empty());
}

#[test]
fn payload_classes() {
	assert_eq!(payload_for("pointerdown", &EventDetails::pointer(5, 6)), json!({ "x": 5, "y": 6 }));
	assert_eq!(payload_for("change", &EventDetails::default()), json!({ "value": "" }));
	assert_eq!(payload_for("keydown", &EventDetails::value("ignored")), json!({}));
	assert_eq!(payload_for("click", &EventDetails::default()), json!({}));
}

#[test]
fn reusing_a_live_id_moves_its_listeners() {
	let (mut tree, outbox) = tree_with(json!({
		"id": "root",
		"tag": "div",
		"children": [{ "id": "1-0", "tag": "button", "events": ["click"] }],
	}));
	let old = node(&tree, "1-0");

	let report = tree.apply_batch(vec![json!({
		"action": "append",
		"selector": "root",
		"value": { "id": "1-0", "tag": "a", "events": ["click"] },
	})]);
	assert_eq!(report.applied, 1);

	let new = node(&tree, "1-0");
	assert_ne!(new, old);
	assert!(tree.dom().is_alive(old));
	assert_eq!(tree.dom().listener_count(old, "click"), 0);
	assert_eq!(tree.dom().listener_count(new, "click"), 1);
	assert_eq!(tree.listeners().len(), 1);

	assert_eq!(tree.dom().dispatch(old, "click", &EventDetails::pointer(1, 1)), 0);
	assert!(outbox.frames().is_empty());
	tree.dom().dispatch(new, "click", &EventDetails::pointer(2, 3));
	assert_eq!(outbox.last_json()["payload"], json!({ "x": 2, "y": 3 }));

	// Deleting the id removes the node it resolves to now; the shadowed one stays, unaddressable.
	tree.apply_batch(vec![json!({ "action": "delete", "selector": "1-0" })]);
	assert!(!tree.dom().is_alive(new));
	assert!(tree.dom().is_alive(old));
	assert!(tree.lookup("1-0").is_none());
	assert!(tree.listeners().is_empty());
}

#[test]
fn updating_into_a_live_id_unbinds_the_shadowed_node() {
	let (mut tree, _) = tree_with(json!({
		"id": "root",
		"tag": "div",
		"children": [
			{ "id": "1-0", "tag": "button", "events": ["click"] },
			{ "id": "1-1", "tag": "span" },
		],
	}));
	let shadowed = node(&tree, "1-0");

	let report = tree.apply_batch(vec![json!({
		"action": "update",
		"selector": "1-1",
		"value": { "id": "1-0", "tag": "b", "events": ["click", "input"] },
	})]);
	assert_eq!(report.applied, 1);

	let current = node(&tree, "1-0");
	assert_eq!(tree.dom().tag(current), Some("b"));
	assert_eq!(tree.dom().listener_count(shadowed, "click"), 0);
	assert_eq!(tree.dom().listener_count(current, "click"), 1);
	assert_eq!(tree.dom().listener_count(current, "input"), 1);
	assert_eq!(tree.listeners().len(), 2);
	assert!(tree.lookup("1-1").is_none());
}
