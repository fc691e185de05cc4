//! Time-Travel Recorder: inbound message and tree snapshot histories with a scrubbable inspection panel.
//!
//! Scrubbing only changes what the panel shows.
//! Putting a recorded snapshot back on screen is a separate, explicit action
//! (see [`crate::session::Session::apply_recorded_state`]) that bypasses the registry entirely.

use crate::dom::Dom;
use serde_json::Value;
use tracing::{error, trace};

pub const PANEL_ID: &str = "debugger";
pub const CONTENT_ID: &str = "debugger-content";

/// One point in the recorded history.
///
/// The two histories are parallel but independent, so either side may be missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry<'a> {
	pub index: usize,
	pub message: Option<&'a Value>,
	pub state: Option<&'a str>,
}

/// Host nodes of the inspection panel.
#[derive(Debug, Clone)]
pub struct Panel<N> {
	pub root: N,
	pub slider: N,
	pub apply: N,
	pub content: N,
}

#[derive(Debug)]
pub struct Recorder<N> {
	enabled: bool,
	messages: Vec<Value>,
	states: Vec<String>,
	cursor: usize,
	panel: Option<Panel<N>>,
}
impl<N: Clone> Recorder<N> {
	/// Creates the recorder, and its panel if `enabled`.
	pub fn new<D: Dom<Node = N>>(enabled: bool, dom: &mut D) -> Self {
		let panel = if enabled {
			match create_panel(dom) {
				Ok(panel) => Some(panel),
				Err(error) => {
					error!("Could not create the debugger panel: {}", error);
					None
				}
			}
		} else {
			None
		};
		Self {
			enabled,
			messages: Vec::new(),
			states: Vec::new(),
			cursor: 0,
			panel,
		}
	}

	#[must_use]
	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn panel(&self) -> Option<&Panel<N>> {
		self.panel.as_ref()
	}

	pub fn record_message<D: Dom<Node = N>>(&mut self, dom: &mut D, message: Value) {
		if !self.enabled {
			return;
		}
		self.messages.push(message);
		self.jump_to_latest(dom);
	}

	pub fn record_state<D: Dom<Node = N>>(&mut self, dom: &mut D, snapshot: String) {
		if !self.enabled {
			return;
		}
		self.states.push(snapshot);
		self.jump_to_latest(dom);
	}

	/// Number of recorded points in time.
	#[must_use]
	pub fn len(&self) -> usize {
		self.messages.len().max(self.states.len())
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Highest valid cursor position.
	#[must_use]
	pub fn bound(&self) -> usize {
		self.len().saturating_sub(1)
	}

	#[must_use]
	pub fn cursor(&self) -> usize {
		self.cursor
	}

	pub fn messages(&self) -> &[Value] {
		&self.messages
	}

	pub fn states(&self) -> &[String] {
		&self.states
	}

	#[must_use]
	pub fn entry(&self, index: usize) -> Option<HistoryEntry<'_>> {
		if index >= self.len() {
			return None;
		}
		Some(HistoryEntry {
			index,
			message: self.messages.get(index),
			state: self.states.get(index).map(String::as_str),
		})
	}

	/// The snapshot at the cursor.
	#[must_use]
	pub fn selected_state(&self) -> Option<&str> {
		self.states.get(self.cursor).map(String::as_str)
	}

	/// Moves the cursor, clamped to the recorded range, and re-renders the panel.
	pub fn scrub<D: Dom<Node = N>>(&mut self, dom: &mut D, index: usize) {
		if !self.enabled {
			return;
		}
		self.cursor = index.min(self.bound());
		trace!("Scrubbed to {}.", self.cursor);
		self.render(dom);
	}

	fn jump_to_latest<D: Dom<Node = N>>(&mut self, dom: &mut D) {
		self.cursor = self.bound();
		self.render(dom);
	}

	fn render<D: Dom<Node = N>>(&self, dom: &mut D) {
		let panel = match &self.panel {
			Some(panel) => panel,
			None => return,
		};

		let bound = self.bound().to_string();
		let cursor = self.cursor.to_string();
		for (name, value) in [("max", &bound), ("value", &cursor)].iter() {
			if let Err(error) = dom.set_attribute(&panel.slider, name, value) {
				error!("Could not update the debugger slider: {}", error);
			}
		}
		dom.set_value(&panel.slider, &cursor);

		dom.clear_children(&panel.content);
		let mut sections = vec![("h3", format!("Time: {}", self.cursor))];
		let state = self.selected_state();
		if state.is_some() {
			sections.push(("h4", "State:".to_owned()));
		}
		if let Some(message) = self.messages.get(self.cursor) {
			sections.push(("h4", "Message:".to_owned()));
			sections.push(("pre", serde_json::to_string_pretty(message).unwrap_or_else(|error| error.to_string())));
		}
		for (tag, text) in sections {
			if let Err(error) = append_text_element(dom, &panel.content, tag, &text) {
				error!("Could not render the debugger panel: {}", error);
			}
		}

		let toggled = if state.is_some() {
			dom.remove_attribute(&panel.apply, "hidden")
		} else {
			dom.set_attribute(&panel.apply, "hidden", "")
		};
		if let Err(error) = toggled {
			error!("Could not toggle the apply button: {}", error);
		}
	}
}

fn create_panel<D: Dom>(dom: &mut D) -> Result<Panel<D::Node>, crate::error::DomError> {
	let root = dom.create_element("div")?;
	dom.set_attribute(&root, "id", PANEL_ID)?;

	let slider = dom.create_element("input")?;
	for (name, value) in &[("type", "range"), ("min", "0"), ("max", "0"), ("value", "0")] {
		dom.set_attribute(&slider, name, value)?;
	}
	dom.append_child(&root, &slider)?;

	let apply = dom.create_element("button")?;
	dom.set_attribute(&apply, "hidden", "")?;
	dom.set_text_content(&apply, "Apply State");
	dom.append_child(&root, &apply)?;

	let content = dom.create_element("div")?;
	dom.set_attribute(&content, "id", CONTENT_ID)?;
	dom.append_child(&root, &content)?;

	let body = dom.body();
	dom.append_child(&body, &root)?;
	Ok(Panel { root, slider, apply, content })
}

fn append_text_element<D: Dom>(dom: &mut D, parent: &D::Node, tag: &str, text: &str) -> Result<(), crate::error::DomError> {
	let element = dom.create_element(tag)?;
	dom.set_text_content(&element, text);
	dom.append_child(parent, &element)
}
