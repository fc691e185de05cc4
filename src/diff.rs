//! Diff Applier: mutates the live tree in place, one addressed change at a time.

use crate::{
	dom::{is_protected_attribute, Dom, EVENTS_ATTRIBUTE},
	error::Diagnostic,
	protocol::{Change, Descriptor},
	registry::{LinkAt, NodeKey},
	tree::LiveTree,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error, instrument, trace, trace_span, warn};

/// Outcome of one applied batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
	pub applied: usize,
	/// One entry per skipped change, in batch order.
	pub diagnostics: Vec<Diagnostic>,
}
impl BatchReport {
	#[must_use]
	pub fn skipped(&self) -> usize {
		self.diagnostics.len()
	}

	fn record(&mut self, result: Result<(), Diagnostic>) {
		match result {
			Ok(()) => self.applied += 1,
			Err(diagnostic) => {
				error!("{}", diagnostic);
				self.diagnostics.push(diagnostic);
			}
		}
	}
}

#[derive(Clone, Copy)]
enum Insert {
	Append,
	Prepend,
}

impl<D: Dom> LiveTree<D> {
	/// Decodes and applies `changes` strictly in order.
	///
	/// Every change sees the effects of the ones before it.
	/// A change that can't be decoded or applied is skipped; the rest of the batch still runs.
	#[instrument(skip_all, fields(len = changes.len()))]
	pub fn apply_batch(&mut self, changes: Vec<Value>) -> BatchReport {
		let mut report = BatchReport::default();
		for raw in changes {
			report.record(Change::decode(raw).and_then(|change| self.apply_change(&change)));
		}
		debug!("Applied {} change(s), skipped {}.", report.applied, report.skipped());
		report
	}

	/// Like [`Self::apply_batch`], for already decoded changes.
	pub fn apply_changes(&mut self, changes: &[Change]) -> BatchReport {
		let mut report = BatchReport::default();
		for change in changes {
			report.record(self.apply_change(change));
		}
		report
	}

	/// Applies a single change.
	///
	/// # Errors
	///
	/// Iff the action is unknown, the selector doesn't resolve, or the action doesn't fit the addressed node.
	pub fn apply_change(&mut self, change: &Change) -> Result<(), Diagnostic> {
		let selector = change.selector();
		let span = trace_span!("Applying change", selector, action = change.action());
		let _enter = span.enter();

		if let Change::Unrecognized { action, .. } = change {
			return Err(Diagnostic::UnknownAction {
				selector: selector.to_owned(),
				action: action.clone(),
			});
		}

		let key = self.registry.key_of(selector).ok_or_else(|| Diagnostic::MissingNode {
			selector: selector.to_owned(),
			action: change.action().to_owned(),
		})?;
		let node = self.registry.handle(key).cloned().ok_or_else(|| Diagnostic::MissingNode {
			selector: selector.to_owned(),
			action: change.action().to_owned(),
		})?;
		let invalid = |reason: String| Diagnostic::InvalidTarget {
			selector: selector.to_owned(),
			action: change.action().to_owned(),
			reason,
		};

		match change {
			Change::Update { value, .. } => self.update(key, &node, value).map_err(invalid),
			Change::Append { value, .. } => self.insert(key, &node, value, Insert::Append).map_err(invalid),
			Change::Prepend { value, .. } => self.insert(key, &node, value, Insert::Prepend).map_err(invalid),
			Change::Delete { .. } => {
				self.evict(key);
				self.dom.remove(&node);
				Ok(())
			}
			Change::UpdateProperties { properties, .. } => self.update_properties(selector, &node, properties).map_err(invalid),
			Change::UpdateText { value, .. } => {
				self.update_text(key, &node, value);
				Ok(())
			}
			Change::UpdateEvents { remove, value, .. } => self.update_events(key, selector, &node, remove, value).map_err(invalid),
			Change::Unrecognized { .. } => Ok(()),
		}
	}

	fn update(&mut self, key: NodeKey, old: &D::Node, value: &Descriptor) -> Result<(), String> {
		let was_root = self.root == Some(key);

		// Materialized before evicting: ids shared by both subtrees must end up resolving to the new nodes.
		let (new_key, new) = self.materialize(value).ok_or_else(|| "could not create the replacement".to_owned())?;
		let parent = self.evict(key).and_then(|eviction| eviction.parent.map(|parent| (parent, eviction.index)));
		if let Err(error) = self.dom.replace(old, &new) {
			self.discard(new_key);
			self.dom.remove(old);
			return Err(error.to_string());
		}

		match parent {
			Some((parent, index)) => self.registry.link(parent, new_key, LinkAt::Index(index)),
			None if was_root => self.root = Some(new_key),
			None => trace!("Replaced an unlinked node."),
		}
		Ok(())
	}

	fn insert(&mut self, key: NodeKey, parent: &D::Node, value: &Descriptor, at: Insert) -> Result<(), String> {
		if !self.dom.is_element(parent) {
			return Err("only elements have children".to_owned());
		}

		let (child_key, child) = self.materialize(value).ok_or_else(|| "could not create the new child".to_owned())?;
		let (result, link_at) = match at {
			Insert::Append => (self.dom.append_child(parent, &child), LinkAt::End),
			Insert::Prepend => (self.dom.prepend_child(parent, &child), LinkAt::Start),
		};
		match result {
			Ok(()) => {
				self.registry.link(key, child_key, link_at);
				Ok(())
			}
			Err(error) => {
				self.discard(child_key);
				Err(error.to_string())
			}
		}
	}

	fn update_properties(&mut self, selector: &str, node: &D::Node, properties: &BTreeMap<String, String>) -> Result<(), String> {
		if !self.dom.is_element(node) {
			return Err("text nodes have no attributes".to_owned());
		}

		for name in self.dom.attribute_names(node) {
			if is_protected_attribute(&name) {
				continue;
			}
			if let Err(error) = self.dom.remove_attribute(node, &name) {
				warn!("Could not remove attribute {:?} from {:?}: {}", name, selector, error)
			}
		}

		for (name, value) in properties {
			if is_protected_attribute(name) {
				warn!("Ignoring protected attribute {:?} for {:?}.", name, selector);
				continue;
			}
			if let Err(error) = self.dom.set_attribute(node, name, value) {
				if cfg!(feature = "dangerous-logging") {
					warn!("Could not set attribute {:?}={:?} on {:?}: {}", name, value, selector, error)
				} else {
					warn!("Could not set attribute {:?} on {:?}: {}", name, selector, error)
				}
			}
			if name == "value" && !self.dom.set_value(node, value) {
				trace!("{:?} has no live value.", selector);
			}
		}
		Ok(())
	}

	fn update_text(&mut self, key: NodeKey, node: &D::Node, text: &str) {
		if self.dom.is_element(node) {
			for id in self.registry.evict_children(key) {
				self.unbind_node(&id);
			}
		}
		if cfg!(feature = "dangerous-logging") {
			trace!("Setting text {:?}", text);
		}
		self.dom.set_text_content(node, text);
	}

	fn update_events(&mut self, key: NodeKey, selector: &str, node: &D::Node, remove: &[String], value: &[String]) -> Result<(), String> {
		if !self.dom.is_element(node) {
			return Err("text nodes have no events".to_owned());
		}

		for event in remove {
			self.unbind(selector, event);
		}

		if let Err(error) = self.dom.set_attribute(node, EVENTS_ATTRIBUTE, &value.join(",")) {
			error!("Could not set {:?} on {:?}: {}", EVENTS_ATTRIBUTE, selector, error)
		}
		self.registry.set_events(key, value.to_vec());

		// Newly declared names stay unbound here; see `bind_declared_events`.
		let unbound = value.iter().filter(|event| !event.is_empty() && !self.listeners.contains(selector, event)).count();
		if unbound > 0 {
			debug!("{} declared event(s) of {:?} have no listener.", unbound, selector);
		}
		Ok(())
	}
}
