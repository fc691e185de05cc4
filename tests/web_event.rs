#![cfg(target_arch = "wasm32")]

mod common;

use common::{descriptor, Outbox};
use remote_dom::{recorder::PANEL_ID, web::WebDom, Config, LiveTree, Outbound, Session};
use serde_json::json;
use std::{rc::Rc, sync::Once};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Event, HtmlElement, HtmlInputElement, Node};

wasm_bindgen_test_configure!(run_in_browser);

static LOG: Once = Once::new();

fn live_tree() -> (LiveTree<WebDom>, Rc<Outbox>) {
	LOG.call_once(tracing_wasm::set_as_global_default);

	let document = window().unwrap().document().unwrap();
	let container = document.create_element("div").unwrap();
	document.body().unwrap().append_child(&container).unwrap();

	let outbox = Rc::new(Outbox::default());
	let outbound: Outbound = outbox.clone();
	let mut tree = LiveTree::new(WebDom::new(document), Node::from(container), outbound);
	tree.replace_tree(&descriptor(json!({
		"id": "root",
		"tag": "div",
		"children": [
			{ "id": "1-0", "tag": "button", "events": ["click"], "text": "Go" },
			{ "id": "1-1", "tag": "input", "events": ["input"] },
		],
	})))
	.unwrap();
	(tree, outbox)
}

#[wasm_bindgen_test]
fn click() {
	let (mut tree, outbox) = live_tree();
	let button: HtmlElement = tree.lookup("1-0").unwrap().clone().dyn_into().unwrap();

	button.click();
	assert_eq!(outbox.last_json(), json!({ "handler": [1, 0], "name": "click", "payload": { "x": 0, "y": 0 } }));

	tree.apply_batch(vec![json!({ "action": "updateevents", "selector": "1-0", "remove": ["click"], "value": [] })]);
	button.click();
	assert_eq!(outbox.frames().len(), 1);
}

#[wasm_bindgen_test]
fn input() {
	let (tree, outbox) = live_tree();
	let input: HtmlInputElement = tree.lookup("1-1").unwrap().clone().dyn_into().unwrap();

	input.set_value("hello");
	input.dispatch_event(&Event::new("input").unwrap()).unwrap();
	assert_eq!(outbox.last_json(), json!({ "handler": [1, 1], "name": "input", "payload": { "value": "hello" } }));
}

#[wasm_bindgen_test]
fn debugger_panel() {
	LOG.call_once(tracing_wasm::set_as_global_default);

	let document = window().unwrap().document().unwrap();
	assert!(document.get_element_by_id(PANEL_ID).is_none());

	let dom = WebDom::new(document.clone());
	let container: Node = document.create_element("div").unwrap().into();
	let outbound: Outbound = Rc::new(Outbox::default());
	let mut session = Session::new(Config::new().with_debug(true), dom, container, outbound);
	assert!(document.get_element_by_id(PANEL_ID).is_some());

	session.on_frame(&json!({ "body": { "id": "root", "tag": "p", "text": "recorded" } }).to_string());
	assert_eq!(session.recorder().states(), [r#"<p id="root">recorded</p>"#]);
}
