//! Event Dispatch Bridge: binds interaction listeners on live nodes and reports fired events to the server.

use crate::{
	closure_map::Binding,
	dom::{Dom, EventCallback, EventDetails},
	error::TransportError,
	protocol::{HandlerRef, InteractionEvent},
	tree::LiveTree,
};
use serde_json::{json, Value};
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, warn};

/// Outbound half of the connection.
///
/// Sending is fire-and-forget: nothing waits for the server to acknowledge a frame.
pub trait Transport {
	/// # Errors
	///
	/// Iff the frame couldn't be handed to the connection.
	fn send(&self, frame: &str) -> Result<(), TransportError>;
}

pub type Outbound = Rc<dyn Transport>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
	Pointer,
	Input,
	Other,
}

#[must_use]
pub fn event_class(event: &str) -> EventClass {
	match event {
		"click" | "dblclick" | "mousedown" | "mouseup" | "mouseover" | "mouseout" | "mousemove" | "mouseenter" | "mouseleave" | "contextmenu" => EventClass::Pointer,
		_ if event.starts_with("pointer") => EventClass::Pointer,
		"input" | "change" => EventClass::Input,
		_ => EventClass::Other,
	}
}

/// The payload reported for `event`: client coordinates for pointer events, the current value for input events.
#[must_use]
pub fn payload_for(event: &str, details: &EventDetails) -> Value {
	match (event_class(event), details) {
		(EventClass::Pointer, EventDetails { pointer: Some((x, y)), .. }) => json!({ "x": x, "y": y }),
		(EventClass::Input, EventDetails { value, .. }) => json!({ "value": value.as_deref().unwrap_or_default() }),
		_ => json!({}),
	}
}

fn interaction_callback(outbound: Outbound, target: &str, event: &str) -> EventCallback {
	let handler = HandlerRef::for_id(target);
	let name = event.to_owned();
	Box::new(move |details| {
		let message = InteractionEvent {
			handler: handler.clone(),
			name: name.clone(),
			payload: payload_for(&name, details),
		};
		if cfg!(feature = "dangerous-logging") {
			trace!("Sending interaction {:?}", message);
		}
		match serde_json::to_string(&message) {
			Ok(frame) => {
				if let Err(error) = outbound.send(&frame) {
					warn!("Dropped {:?} interaction: {}", name, error);
				}
			}
			Err(error) => error!("Could not encode {:?} interaction: {}", name, error),
		}
	})
}

impl<D: Dom> LiveTree<D> {
	/// Binds a listener that reports `event` on `node` as an interaction of `target`.
	///
	/// Returns `false` without binding anything if `(target, event)` is already bound.
	#[instrument(skip(self, node))]
	pub fn bind(&mut self, node: &D::Node, event: &str, target: &str) -> bool {
		if self.listeners.contains(target, event) {
			trace!("Already bound.");
			return false;
		}

		let callback = interaction_callback(Rc::clone(&self.outbound), target, event);
		let listener = match self.dom.listen(node, event, callback) {
			Ok(listener) => listener,
			Err(error) => {
				error!("Failed to add event listener {:?} on {:?}: {}", event, target, error);
				return false;
			}
		};

		match self.listeners.insert(target, event, Binding { node: node.clone(), listener }) {
			Ok(()) => true,
			Err(Binding { node, listener }) => {
				self.dom.unlisten(&node, event, listener);
				false
			}
		}
	}

	/// Detaches the listener bound for `(target, event)`.
	///
	/// Unbinding a pair that isn't bound does nothing and returns `false`.
	#[instrument(skip(self))]
	pub fn unbind(&mut self, target: &str, event: &str) -> bool {
		match self.listeners.remove(target, event) {
			Some(Binding { node, listener }) => {
				self.dom.unlisten(&node, event, listener);
				true
			}
			None => {
				trace!("Nothing bound.");
				false
			}
		}
	}

	/// Detaches every listener bound for `target`.
	pub(crate) fn unbind_node(&mut self, target: &str) -> usize {
		let bindings = self.listeners.take_node(target);
		let count = bindings.len();
		for (event, Binding { node, listener }) in bindings {
			self.dom.unlisten(&node, &event, listener);
		}
		count
	}

	pub(crate) fn unbind_all(&mut self) -> usize {
		let bindings: Vec<_> = self.listeners.drain().collect();
		let count = bindings.len();
		for (_, event, Binding { node, listener }) in bindings {
			self.dom.unlisten(&node, &event, listener);
		}
		count
	}

	/// Binds every event name declared for an addressable node that doesn't have a listener yet.
	///
	/// This is the only way events named by an `updateevents` change (rather than by materialization) get bound.
	/// Returns how many listeners were added.
	#[instrument(skip(self))]
	pub fn bind_declared_events(&mut self) -> usize {
		let mut pending = Vec::new();
		for (key, id) in self.registry.iter() {
			let node = match self.registry.handle(key) {
				Some(node) => node,
				None => continue,
			};
			for event in self.registry.events(key) {
				if !event.is_empty() && !self.listeners.contains(id, event) {
					pending.push((node.clone(), id.to_owned(), event.clone()));
				}
			}
		}

		let bound = pending.into_iter().filter(|(node, id, event)| self.bind(node, event, id)).count();
		debug!("Bound {} declared event(s).", bound);
		bound
	}
}
