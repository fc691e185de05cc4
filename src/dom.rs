//! The seam between the synchronization core and whatever tree it drives.
//!
//! The browser implementation lives in [`crate::web`], a headless one in [`crate::memory`].

use crate::error::DomError;
use core::fmt::Debug;

/// Attribute the runtime stores each element's id in.
pub const ID_ATTRIBUTE: &str = "id";

/// Attribute the runtime stores each element's comma-separated event names in.
pub const EVENTS_ATTRIBUTE: &str = "data-event";

/// Whether `name` belongs to the runtime's bookkeeping and must never be cleared or overwritten by server properties.
#[must_use]
pub fn is_protected_attribute(name: &str) -> bool {
	name == ID_ATTRIBUTE || name.starts_with(EVENTS_ATTRIBUTE)
}

/// Semantic details of a fired interaction event, as far as the host can extract them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDetails {
	/// Client coordinates, for pointer events.
	pub pointer: Option<(i32, i32)>,
	/// Current editable value of the event's target, for input-like targets.
	pub value: Option<String>,
}
impl EventDetails {
	#[must_use]
	pub fn pointer(x: i32, y: i32) -> Self {
		Self {
			pointer: Some((x, y)),
			value: None,
		}
	}

	#[must_use]
	pub fn value(value: impl Into<String>) -> Self {
		Self {
			pointer: None,
			value: Some(value.into()),
		}
	}
}

/// Invoked by the host whenever a bound event fires.
pub type EventCallback = Box<dyn Fn(&EventDetails)>;

/// A live tree the synchronization core can mutate.
///
/// Handles are cheap to clone and don't own their node: a node is owned by its parent edge,
/// and [`Dom::remove`] and [`Dom::replace`] end its lifetime (or, in the browser, hand it to the garbage collector).
pub trait Dom {
	type Node: Clone + Debug + PartialEq;
	type Listener;

	fn body(&self) -> Self::Node;
	fn set_title(&mut self, title: &str);

	fn create_element(&mut self, tag: &str) -> Result<Self::Node, DomError>;
	fn create_text(&mut self, text: &str) -> Self::Node;
	fn is_element(&self, node: &Self::Node) -> bool;

	fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), DomError>;
	fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), DomError>;
	fn attribute_names(&self, node: &Self::Node) -> Vec<String>;

	/// Updates the live editable value of input-like nodes.
	///
	/// Returns `false` (and does nothing) for other nodes.
	fn set_value(&mut self, node: &Self::Node, value: &str) -> bool;

	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;
	fn prepend_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

	/// Puts `new` where `old` is and discards `old`.
	fn replace(&mut self, old: &Self::Node, new: &Self::Node) -> Result<(), DomError>;

	/// Detaches and discards `node` along with its subtree.
	fn remove(&mut self, node: &Self::Node);

	/// Replaces the node's content with `text`.
	///
	/// For elements this discards all children.
	fn set_text_content(&mut self, node: &Self::Node, text: &str);
	fn clear_children(&mut self, node: &Self::Node);

	fn inner_html(&self, node: &Self::Node) -> String;

	/// Replaces the node's content with raw markup, bypassing all bookkeeping.
	fn set_inner_html(&mut self, node: &Self::Node, html: &str);

	fn listen(&mut self, node: &Self::Node, event: &str, callback: EventCallback) -> Result<Self::Listener, DomError>;
	fn unlisten(&mut self, node: &Self::Node, event: &str, listener: Self::Listener);
}
