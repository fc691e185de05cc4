//! A headless [`Dom`] that keeps its nodes in an arena.
//!
//! Each node is owned by its parent edge: removing or replacing a node frees its whole subtree,
//! and handles to freed nodes stay dead even after their slot is reused.
//! Operations on dead handles are logged and otherwise ignored.

use crate::{
	dom::{Dom, EventCallback, EventDetails},
	error::DomError,
};
use core::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryNode {
	index: u32,
	generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryListener(u64);

const VOID_ELEMENTS: &[&str] = &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr"];
const VALUE_ELEMENTS: &[&str] = &["input", "select", "textarea"];

struct Listener {
	event: String,
	token: MemoryListener,
	callback: Rc<dyn Fn(&EventDetails)>,
}

struct Element {
	tag: String,
	attributes: Vec<(String, String)>,
	/// Live value once set programmatically, overriding the `value` attribute.
	value: Option<String>,
	listeners: Vec<Listener>,
}

enum Kind {
	Element(Element),
	Text(String),
	/// Markup inserted verbatim by [`Dom::set_inner_html`].
	Raw(String),
}

struct NodeData {
	kind: Kind,
	parent: Option<MemoryNode>,
	children: Vec<MemoryNode>,
}

struct Slot {
	generation: u32,
	node: Option<NodeData>,
}

pub struct MemoryDom {
	slots: Vec<Slot>,
	free: Vec<u32>,
	body: MemoryNode,
	title: String,
	next_listener: u64,
}
impl Default for MemoryDom {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for MemoryDom {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryDom")
			.field("title", &self.title)
			.field("live_nodes", &self.live_nodes())
			.finish()
	}
}

impl MemoryDom {
	/// Creates a document with an empty `<body>`.
	#[must_use]
	pub fn new() -> Self {
		let mut dom = Self {
			slots: Vec::new(),
			free: Vec::new(),
			body: MemoryNode { index: 0, generation: 0 },
			title: String::new(),
			next_listener: 0,
		};
		dom.body = dom.allocate(Kind::Element(Element::new("body")));
		dom
	}

	/// Creates a document with a `<div id="app">` container inside its body.
	#[must_use]
	pub fn with_container() -> (Self, MemoryNode) {
		let mut dom = Self::new();
		let container = dom.allocate(Kind::Element(Element::new("div")));
		if let Some(Kind::Element(element)) = dom.node_mut(container).map(|node| &mut node.kind) {
			element.attributes.push(("id".to_owned(), "app".to_owned()));
		}
		let body = dom.body;
		dom.adopt(body, container, None);
		(dom, container)
	}

	#[must_use]
	pub fn title(&self) -> &str {
		&self.title
	}

	#[must_use]
	pub fn is_alive(&self, node: MemoryNode) -> bool {
		self.node(node).is_some()
	}

	/// Number of nodes that haven't been freed.
	#[must_use]
	pub fn live_nodes(&self) -> usize {
		self.slots.len() - self.free.len()
	}

	#[must_use]
	pub fn tag(&self, node: MemoryNode) -> Option<&str> {
		self.element(node).map(|element| element.tag.as_str())
	}

	#[must_use]
	pub fn attribute(&self, node: MemoryNode, name: &str) -> Option<&str> {
		self.element(node)?.attributes.iter().find(|(n, _)| n == name).map(|(_, value)| value.as_str())
	}

	/// The node's current editable value, for input-like elements.
	#[must_use]
	pub fn value(&self, node: MemoryNode) -> Option<&str> {
		let element = self.element(node).filter(|element| element.is_value_element())?;
		element.value.as_deref().or_else(|| self.attribute(node, "value")).or(Some(""))
	}

	/// Data of a text node.
	#[must_use]
	pub fn text(&self, node: MemoryNode) -> Option<&str> {
		match &self.node(node)?.kind {
			Kind::Text(text) => Some(text),
			_ => None,
		}
	}

	/// Concatenated text of the node and its descendants.
	#[must_use]
	pub fn text_content(&self, node: MemoryNode) -> String {
		let mut text = String::new();
		self.collect_text(node, &mut text);
		text
	}

	#[must_use]
	pub fn children(&self, node: MemoryNode) -> &[MemoryNode] {
		self.node(node).map_or(&[], |node| &node.children)
	}

	#[must_use]
	pub fn parent(&self, node: MemoryNode) -> Option<MemoryNode> {
		self.node(node)?.parent
	}

	#[must_use]
	pub fn listener_count(&self, node: MemoryNode, event: &str) -> usize {
		self.element(node).map_or(0, |element| element.listeners.iter().filter(|listener| listener.event == event).count())
	}

	/// Simulates a user interaction by invoking every listener for `event` on `node`.
	///
	/// Returns how many listeners ran.
	pub fn dispatch(&self, node: MemoryNode, event: &str, details: &EventDetails) -> usize {
		let callbacks: Vec<_> = match self.element(node) {
			Some(element) => element.listeners.iter().filter(|listener| listener.event == event).map(|listener| Rc::clone(&listener.callback)).collect(),
			None => return 0,
		};
		for callback in &callbacks {
			callback(details);
		}
		callbacks.len()
	}

	#[must_use]
	pub fn outer_html(&self, node: MemoryNode) -> String {
		let mut html = String::new();
		self.write_html(node, &mut html);
		html
	}

	fn allocate(&mut self, kind: Kind) -> MemoryNode {
		let data = NodeData {
			kind,
			parent: None,
			children: Vec::new(),
		};
		match self.free.pop() {
			Some(index) => {
				let slot = &mut self.slots[index as usize];
				slot.node = Some(data);
				MemoryNode { index, generation: slot.generation }
			}
			None => {
				self.slots.push(Slot { generation: 0, node: Some(data) });
				MemoryNode {
					index: self.slots.len() as u32 - 1,
					generation: 0,
				}
			}
		}
	}

	fn node(&self, node: MemoryNode) -> Option<&NodeData> {
		self.slots
			.get(node.index as usize)
			.filter(|slot| slot.generation == node.generation)
			.and_then(|slot| slot.node.as_ref())
	}

	fn node_mut(&mut self, node: MemoryNode) -> Option<&mut NodeData> {
		self.slots
			.get_mut(node.index as usize)
			.filter(|slot| slot.generation == node.generation)
			.and_then(|slot| slot.node.as_mut())
	}

	fn element(&self, node: MemoryNode) -> Option<&Element> {
		match &self.node(node)?.kind {
			Kind::Element(element) => Some(element),
			_ => None,
		}
	}

	fn element_mut(&mut self, node: MemoryNode) -> Result<&mut Element, DomError> {
		match self.node_mut(node).map(|node| &mut node.kind) {
			Some(Kind::Element(element)) => Ok(element),
			Some(_) => Err(DomError::new("not an element")),
			None => Err(DomError::new("node was freed")),
		}
	}

	fn is_ancestor(&self, ancestor: MemoryNode, mut node: MemoryNode) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			node = match self.parent(node) {
				Some(parent) => parent,
				None => return false,
			};
		}
	}

	/// Unlinks `node` from its parent, returning its former position.
	fn detach(&mut self, node: MemoryNode) -> Option<(MemoryNode, usize)> {
		let parent = self.node_mut(node)?.parent.take()?;
		let siblings = &mut self.node_mut(parent)?.children;
		let index = siblings.iter().position(|&sibling| sibling == node)?;
		siblings.remove(index);
		Some((parent, index))
	}

	fn adopt(&mut self, parent: MemoryNode, child: MemoryNode, index: Option<usize>) {
		self.detach(child);
		if let Some(data) = self.node_mut(child) {
			data.parent = Some(parent);
		}
		if let Some(data) = self.node_mut(parent) {
			let index = index.unwrap_or(data.children.len()).min(data.children.len());
			data.children.insert(index, child);
		}
	}

	fn check_insert(&self, parent: MemoryNode, child: MemoryNode) -> Result<(), DomError> {
		if self.element(parent).is_none() {
			return Err(DomError::new("only live elements can have children"));
		}
		if !self.is_alive(child) {
			return Err(DomError::new("child was freed"));
		}
		if self.is_ancestor(child, parent) {
			return Err(DomError::new("a node can't contain itself"));
		}
		Ok(())
	}

	fn free_subtree(&mut self, node: MemoryNode) {
		self.detach(node);
		let mut stack = vec![node];
		while let Some(node) = stack.pop() {
			let slot = match self.slots.get_mut(node.index as usize).filter(|slot| slot.generation == node.generation) {
				Some(slot) => slot,
				None => continue,
			};
			if let Some(data) = slot.node.take() {
				slot.generation = slot.generation.wrapping_add(1);
				self.free.push(node.index);
				stack.extend(data.children);
			}
		}
	}

	fn free_children(&mut self, node: MemoryNode) {
		let children = match self.node_mut(node) {
			Some(data) => core::mem::take(&mut data.children),
			None => return,
		};
		for child in children {
			if let Some(data) = self.node_mut(child) {
				data.parent = None;
			}
			self.free_subtree(child);
		}
	}

	fn collect_text(&self, node: MemoryNode, text: &mut String) {
		match self.node(node).map(|data| &data.kind) {
			Some(Kind::Text(data)) => text.push_str(data),
			Some(Kind::Element(_)) => {
				for &child in self.children(node) {
					self.collect_text(child, text);
				}
			}
			Some(Kind::Raw(_)) | None => (),
		}
	}

	fn write_html(&self, node: MemoryNode, html: &mut String) {
		match self.node(node).map(|data| &data.kind) {
			Some(Kind::Text(text)) => escape_into(text, false, html),
			Some(Kind::Raw(raw)) => html.push_str(raw),
			Some(Kind::Element(element)) => {
				html.push('<');
				html.push_str(&element.tag);
				for (name, value) in &element.attributes {
					html.push(' ');
					html.push_str(name);
					html.push_str("=\"");
					escape_into(value, true, html);
					html.push('"');
				}
				html.push('>');
				if VOID_ELEMENTS.contains(&element.tag.as_str()) {
					return;
				}
				for &child in self.children(node) {
					self.write_html(child, html);
				}
				html.push_str("</");
				html.push_str(&element.tag);
				html.push('>');
			}
			None => (),
		}
	}

	fn dead(&self, operation: &str) {
		warn!("{} on a freed node. Ignoring.", operation);
	}
}

impl Element {
	fn new(tag: &str) -> Self {
		Self {
			tag: tag.to_ascii_lowercase(),
			attributes: Vec::new(),
			value: None,
			listeners: Vec::new(),
		}
	}

	fn is_value_element(&self) -> bool {
		VALUE_ELEMENTS.contains(&self.tag.as_str())
	}
}

fn is_valid_name(name: &str) -> bool {
	!name.is_empty() && !name.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '/' | '='))
}

fn escape_into(text: &str, attribute: bool, html: &mut String) {
	for c in text.chars() {
		match c {
			'&' => html.push_str("&amp;"),
			'<' => html.push_str("&lt;"),
			'>' => html.push_str("&gt;"),
			'"' if attribute => html.push_str("&quot;"),
			c => html.push(c),
		}
	}
}

impl Dom for MemoryDom {
	type Node = MemoryNode;
	type Listener = MemoryListener;

	fn body(&self) -> MemoryNode {
		self.body
	}

	fn set_title(&mut self, title: &str) {
		self.title = title.to_owned();
	}

	fn create_element(&mut self, tag: &str) -> Result<MemoryNode, DomError> {
		if !is_valid_name(tag) || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
			return Err(DomError::new(format!("invalid tag name {:?}", tag)));
		}
		Ok(self.allocate(Kind::Element(Element::new(tag))))
	}

	fn create_text(&mut self, text: &str) -> MemoryNode {
		self.allocate(Kind::Text(text.to_owned()))
	}

	fn is_element(&self, node: &MemoryNode) -> bool {
		self.element(*node).is_some()
	}

	fn set_attribute(&mut self, node: &MemoryNode, name: &str, value: &str) -> Result<(), DomError> {
		if !is_valid_name(name) {
			return Err(DomError::new(format!("invalid attribute name {:?}", name)));
		}
		let element = self.element_mut(*node)?;
		match element.attributes.iter_mut().find(|(n, _)| n == name) {
			Some((_, existing)) => value.clone_into(existing),
			None => element.attributes.push((name.to_owned(), value.to_owned())),
		}
		Ok(())
	}

	fn remove_attribute(&mut self, node: &MemoryNode, name: &str) -> Result<(), DomError> {
		self.element_mut(*node)?.attributes.retain(|(n, _)| n != name);
		Ok(())
	}

	fn attribute_names(&self, node: &MemoryNode) -> Vec<String> {
		self.element(*node).map_or_else(Vec::new, |element| element.attributes.iter().map(|(name, _)| name.clone()).collect())
	}

	fn set_value(&mut self, node: &MemoryNode, value: &str) -> bool {
		match self.element_mut(*node) {
			Ok(element) if element.is_value_element() => {
				element.value = Some(value.to_owned());
				true
			}
			_ => false,
		}
	}

	fn append_child(&mut self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), DomError> {
		self.check_insert(*parent, *child)?;
		self.adopt(*parent, *child, None);
		Ok(())
	}

	fn prepend_child(&mut self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), DomError> {
		self.check_insert(*parent, *child)?;
		self.adopt(*parent, *child, Some(0));
		Ok(())
	}

	fn replace(&mut self, old: &MemoryNode, new: &MemoryNode) -> Result<(), DomError> {
		let parent = self.parent(*old).ok_or_else(|| DomError::new("node to replace has no parent"))?;
		if old == new {
			return Ok(());
		}
		self.check_insert(parent, *new)?;
		let (parent, index) = self.detach(*old).ok_or_else(|| DomError::new("node to replace has no parent"))?;
		self.adopt(parent, *new, Some(index));
		self.free_subtree(*old);
		Ok(())
	}

	fn remove(&mut self, node: &MemoryNode) {
		if !self.is_alive(*node) {
			return self.dead("remove");
		}
		self.free_subtree(*node);
		trace!("Freed subtree; {} live node(s) remain.", self.live_nodes());
	}

	fn set_text_content(&mut self, node: &MemoryNode, text: &str) {
		match self.node_mut(*node).map(|data| &mut data.kind) {
			Some(Kind::Text(data)) | Some(Kind::Raw(data)) => text.clone_into(data),
			Some(Kind::Element(_)) => {
				self.free_children(*node);
				if !text.is_empty() {
					let child = self.create_text(text);
					self.adopt(*node, child, None);
				}
			}
			None => self.dead("set_text_content"),
		}
	}

	fn clear_children(&mut self, node: &MemoryNode) {
		self.free_children(*node);
	}

	fn inner_html(&self, node: &MemoryNode) -> String {
		let mut html = String::new();
		match self.node(*node).map(|data| &data.kind) {
			Some(Kind::Element(_)) => {
				for &child in self.children(*node) {
					self.write_html(child, &mut html);
				}
			}
			Some(_) => self.write_html(*node, &mut html),
			None => self.dead("inner_html"),
		}
		html
	}

	fn set_inner_html(&mut self, node: &MemoryNode, html: &str) {
		if self.element(*node).is_none() {
			return self.dead("set_inner_html");
		}
		self.free_children(*node);
		let raw = self.allocate(Kind::Raw(html.to_owned()));
		self.adopt(*node, raw, None);
	}

	fn listen(&mut self, node: &MemoryNode, event: &str, callback: EventCallback) -> Result<MemoryListener, DomError> {
		let token = MemoryListener(self.next_listener);
		self.element_mut(*node)?.listeners.push(Listener {
			event: event.to_owned(),
			token,
			callback: Rc::from(callback),
		});
		self.next_listener += 1;
		Ok(token)
	}

	fn unlisten(&mut self, node: &MemoryNode, event: &str, listener: MemoryListener) {
		match self.element_mut(*node) {
			Ok(element) => {
				let before = element.listeners.len();
				element.listeners.retain(|bound| !(bound.token == listener && bound.event == event));
				if element.listeners.len() == before {
					warn!("Listener for {:?} was not attached.", event);
				}
			}
			Err(_) => self.dead("unlisten"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn removing_frees_the_subtree() {
		let (mut dom, container) = MemoryDom::with_container();
		let list = dom.create_element("ul").unwrap();
		let item = dom.create_element("li").unwrap();
		let text = dom.create_text("one");
		dom.append_child(&item, &text).unwrap();
		dom.append_child(&list, &item).unwrap();
		dom.append_child(&container, &list).unwrap();
		let live = dom.live_nodes();

		dom.remove(&list);
		assert_eq!(dom.live_nodes(), live - 3);
		assert!(!dom.is_alive(text));
		assert!(dom.children(container).is_empty());
	}

	#[test]
	fn serializes_and_escapes() {
		let (mut dom, container) = MemoryDom::with_container();
		let input = dom.create_element("INPUT").unwrap();
		dom.set_attribute(&input, "title", "a \"quote\"").unwrap();
		let text = dom.create_text("1 < 2");
		dom.append_child(&container, &input).unwrap();
		dom.append_child(&container, &text).unwrap();
		assert_eq!(dom.inner_html(&container), r#"<input title="a &quot;quote&quot;">1 &lt; 2"#);
	}

	#[test]
	fn live_value_overrides_attribute() {
		let mut dom = MemoryDom::new();
		let input = dom.create_element("input").unwrap();
		dom.set_attribute(&input, "value", "a").unwrap();
		assert_eq!(dom.value(input), Some("a"));
		assert!(dom.set_value(&input, "b"));
		dom.set_attribute(&input, "value", "c").unwrap();
		assert_eq!(dom.value(input), Some("b"));

		let div = dom.create_element("div").unwrap();
		assert!(!dom.set_value(&div, "x"));
		assert_eq!(dom.value(div), None);
	}

	#[test]
	fn text_nodes_have_no_children() {
		let mut dom = MemoryDom::new();
		let text = dom.create_text("leaf");
		let child = dom.create_text("child");
		assert!(dom.append_child(&text, &child).is_err());
	}

	#[test]
	fn cycles_are_rejected() {
		let mut dom = MemoryDom::new();
		let outer = dom.create_element("div").unwrap();
		let inner = dom.create_element("div").unwrap();
		dom.append_child(&outer, &inner).unwrap();
		assert!(dom.append_child(&inner, &outer).is_err());
	}
}
