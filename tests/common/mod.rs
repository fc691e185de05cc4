#![allow(dead_code)]

use remote_dom::{
	memory::{MemoryDom, MemoryNode},
	protocol::Descriptor,
	Config, LiveTree, Outbound, Session, Transport, TransportError,
};
use serde_json::Value;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

/// Records every frame sent through it.
#[derive(Debug, Default)]
pub struct Outbox {
	frames: RefCell<Vec<String>>,
	closed: Cell<bool>,
}
impl Outbox {
	pub fn frames(&self) -> Vec<String> {
		self.frames.borrow().clone()
	}

	pub fn last_json(&self) -> Value {
		let frames = self.frames.borrow();
		serde_json::from_str(frames.last().expect("nothing was sent")).expect("last frame is not JSON")
	}

	pub fn close(&self) {
		self.closed.set(true);
	}
}
impl Transport for Outbox {
	fn send(&self, frame: &str) -> Result<(), TransportError> {
		if self.closed.get() {
			return Err(TransportError::Closed);
		}
		self.frames.borrow_mut().push(frame.to_owned());
		Ok(())
	}
}

pub fn descriptor(value: Value) -> Descriptor {
	serde_json::from_value(value).expect("invalid descriptor")
}

pub fn tree() -> (LiveTree<MemoryDom>, Rc<Outbox>) {
	let (dom, container) = MemoryDom::with_container();
	let outbox = Rc::new(Outbox::default());
	let outbound: Outbound = outbox.clone();
	(LiveTree::new(dom, container, outbound), outbox)
}

pub fn tree_with(body: Value) -> (LiveTree<MemoryDom>, Rc<Outbox>) {
	let (mut tree, outbox) = tree();
	tree.replace_tree(&descriptor(body)).expect("could not materialize");
	(tree, outbox)
}

pub fn session(config: Config) -> (Session<MemoryDom>, Rc<Outbox>) {
	let (dom, container) = MemoryDom::with_container();
	let outbox = Rc::new(Outbox::default());
	let outbound: Outbound = outbox.clone();
	(Session::new(config, dom, container, outbound), outbox)
}

/// A session rendering straight into the document body.
pub fn body_session(config: Config) -> (Session<MemoryDom>, Rc<Outbox>) {
	let dom = MemoryDom::new();
	let body = remote_dom::Dom::body(&dom);
	let outbox = Rc::new(Outbox::default());
	let outbound: Outbound = outbox.clone();
	(Session::new(config, dom, body, outbound), outbox)
}

pub fn node(tree: &LiveTree<MemoryDom>, id: &str) -> MemoryNode {
	*tree.lookup(id).unwrap_or_else(|| panic!("{:?} is not registered", id))
}
