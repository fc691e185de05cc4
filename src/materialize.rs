//! Tree Materializer: builds live nodes from descriptors.

use crate::{
	dom::{Dom, EVENTS_ATTRIBUTE, ID_ATTRIBUTE},
	error::Diagnostic,
	protocol::{Descriptor, ElementDescriptor, TextDescriptor},
	registry::{LinkAt, NodeKey},
	tree::LiveTree,
};
use tracing::{debug, error, instrument, trace, trace_span, warn};

impl<D: Dom> LiveTree<D> {
	/// Builds the subtree described by `descriptor`, depth-first in pre-order, and registers every node in it.
	///
	/// The returned node is neither attached to the host tree nor linked to a parent in the registry.
	/// Returns [`None`] if the host refuses to create the subtree's root; children it refuses are skipped.
	pub fn materialize(&mut self, descriptor: &Descriptor) -> Option<(NodeKey, D::Node)> {
		self.release_id(descriptor.id());
		match descriptor {
			Descriptor::Text(TextDescriptor { id, text }) => {
				let node = self.dom.create_text(text);
				Some((self.registry.register(id, node.clone()), node))
			}
			Descriptor::Element(element) => self.materialize_element(element),
		}
	}

	fn materialize_element(&mut self, descriptor: &ElementDescriptor) -> Option<(NodeKey, D::Node)> {
		let ElementDescriptor {
			id,
			tag,
			attributes,
			events,
			children,
			text,
		} = descriptor;
		let span = trace_span!("Materializing element", id = id.as_str(), tag = tag.as_str());
		let _enter = span.enter();

		let node = match self.dom.create_element(tag) {
			Ok(node) => node,
			Err(error) => {
				error!("Failed to create <{}> for {:?}: {}", tag, id, error);
				return None;
			}
		};

		for (name, value) in attributes {
			if let Err(error) = self.dom.set_attribute(&node, name, value) {
				if cfg!(feature = "dangerous-logging") {
					warn!("Could not set attribute {:?}={:?} on {:?}: {}", name, value, id, error)
				} else {
					warn!("Could not set attribute {:?} on {:?}: {}", name, id, error)
				}
			}
		}

		let mut declared = Vec::with_capacity(events.len());
		for event in events {
			if !event.is_empty() && !declared.contains(event) {
				declared.push(event.clone());
			}
		}

		let bookkeeping = [(ID_ATTRIBUTE, id.clone()), (EVENTS_ATTRIBUTE, declared.join(","))];
		for (name, value) in &bookkeeping {
			if name == &EVENTS_ATTRIBUTE && value.is_empty() {
				continue;
			}
			if let Err(error) = self.dom.set_attribute(&node, name, value) {
				error!("Could not set {:?} on {:?}: {}", name, id, error)
			}
		}

		for event in &declared {
			self.bind(&node, event, id);
		}

		let key = self.registry.register(id, node.clone());
		self.registry.set_events(key, declared);

		match text {
			Some(text) => {
				if !children.is_empty() {
					warn!("{:?} declares both text and {} child(ren); the text replaces the children.", id, children.len());
				}
				self.dom.set_text_content(&node, text);
			}
			None => {
				for child in children {
					let (child_key, child_node) = match self.materialize(child) {
						Some(child) => child,
						None => continue,
					};
					match self.dom.append_child(&node, &child_node) {
						Ok(()) => self.registry.link(key, child_key, LinkAt::End),
						Err(error) => {
							error!("Failed to attach {:?} to {:?}: {}", child.id(), id, error);
							self.discard(child_key);
						}
					}
				}
			}
		}

		Some((key, node))
	}

	/// Unbinds whatever `id` currently resolves to, before it's registered again.
	fn release_id(&mut self, id: &str) {
		if self.registry.contains(id) {
			let unbound = self.unbind_node(id);
			debug!("{:?} is registered again. Unbound {} listener(s) of the previous node.", id, unbound);
		}
	}

	/// Discards the current tree and builds a new one from `body` inside the container.
	///
	/// # Errors
	///
	/// Iff the host refuses to create or attach the new root. The container is left empty in that case.
	#[instrument(skip_all, fields(id = body.id()))]
	pub fn replace_tree(&mut self, body: &Descriptor) -> Result<(), Diagnostic> {
		let unbound = self.unbind_all();
		self.registry.clear();
		self.root = None;
		self.dom.clear_children(&self.container);
		trace!("Cleared previous tree and {} listener(s).", unbound);

		let invalid = |reason: String| Diagnostic::InvalidTarget {
			selector: body.id().to_owned(),
			action: "replace".to_owned(),
			reason,
		};

		let (key, node) = self.materialize(body).ok_or_else(|| invalid("could not create the root node".to_owned()))?;
		if let Err(error) = self.dom.append_child(&self.container, &node) {
			self.discard(key);
			return Err(invalid(error.to_string()));
		}
		self.root = Some(key);
		debug!("Materialized {} node(s).", self.registry.len());
		Ok(())
	}
}
