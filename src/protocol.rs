//! Wire format of the session, in both directions.
//!
//! Inbound frames are either the keep-alive acknowledgment sentinel or JSON objects carrying a whole tree (`body`)
//! or an ordered batch of changes (`diff`), optionally with a document `title`.
//! Outbound frames are the handshake, the keep-alive sentinel and JSON interaction events.

use crate::error::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Id the server uses for the top of its tree.
pub const ROOT_ID: &str = "root";

pub const KEEP_ALIVE: &str = "ping";
pub const KEEP_ALIVE_ACK: &str = "pong";
pub const HANDSHAKE_PREFIX: &str = "init+";

/// The first frame sent once the connection is open.
#[must_use]
pub fn handshake_frame(session_token: Option<&str>) -> String {
	format!("{}{}", HANDSHAKE_PREFIX, session_token.unwrap_or_default())
}

/// Declarative description of one node, as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Descriptor {
	Element(ElementDescriptor),
	Text(TextDescriptor),
}
impl Descriptor {
	#[must_use]
	pub fn id(&self) -> &str {
		match self {
			Descriptor::Element(element) => &element.id,
			Descriptor::Text(text) => &text.id,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
	pub id: String,
	pub tag: String,
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
	#[serde(default)]
	pub events: Vec<String>,
	#[serde(default)]
	pub children: Vec<Descriptor>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDescriptor {
	pub id: String,
	pub text: String,
}

/// One operation of a diff batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
	/// Replace the target's subtree.
	Update { selector: String, value: Descriptor },
	Append { selector: String, value: Descriptor },
	Prepend { selector: String, value: Descriptor },
	Delete { selector: String },
	UpdateProperties { selector: String, properties: BTreeMap<String, String> },
	UpdateText { selector: String, value: String },
	/// Unbind `remove`, then record `value` as the node's full event set.
	UpdateEvents { selector: String, remove: Vec<String>, value: Vec<String> },
	/// An action introduced by a newer server. Skipped when applied.
	Unrecognized { selector: String, action: String },
}
impl Change {
	#[must_use]
	pub fn selector(&self) -> &str {
		match self {
			Change::Update { selector, .. }
			| Change::Append { selector, .. }
			| Change::Prepend { selector, .. }
			| Change::Delete { selector }
			| Change::UpdateProperties { selector, .. }
			| Change::UpdateText { selector, .. }
			| Change::UpdateEvents { selector, .. }
			| Change::Unrecognized { selector, .. } => selector,
		}
	}

	/// The action's wire name.
	#[must_use]
	pub fn action(&self) -> &str {
		match self {
			Change::Update { .. } => "update",
			Change::Append { .. } => "append",
			Change::Prepend { .. } => "prepend",
			Change::Delete { .. } => "delete",
			Change::UpdateProperties { .. } => "updateproperties",
			Change::UpdateText { .. } => "updatetext",
			Change::UpdateEvents { .. } => "updateevents",
			Change::Unrecognized { action, .. } => action,
		}
	}

	/// Decodes a single change of a batch.
	///
	/// # Errors
	///
	/// Iff the change lacks a selector or action, or its payload doesn't fit its action.
	pub fn decode(raw: Value) -> Result<Self, Diagnostic> {
		let RawChange {
			selector,
			action,
			value,
			properties,
			remove,
		} = serde_json::from_value(raw).map_err(decode_error)?;

		fn required<T>(field: Option<T>, action: &str, name: &str) -> Result<T, Diagnostic> {
			field.ok_or_else(|| Diagnostic::Decode {
				reason: format!("{} change without `{}`", action, name),
			})
		}
		fn descriptor(value: Option<Value>, action: &str) -> Result<Descriptor, Diagnostic> {
			serde_json::from_value(required(value, action, "value")?).map_err(decode_error)
		}

		Ok(match action.as_str() {
			"update" => Change::Update {
				value: descriptor(value, &action)?,
				selector,
			},
			"append" => Change::Append {
				value: descriptor(value, &action)?,
				selector,
			},
			"prepend" => Change::Prepend {
				value: descriptor(value, &action)?,
				selector,
			},
			"delete" => Change::Delete { selector },
			"updateproperties" => Change::UpdateProperties {
				properties: required(properties, &action, "properties")?
					.into_iter()
					.map(|(name, value)| (name, attribute_value(value)))
					.collect(),
				selector,
			},
			"updatetext" => Change::UpdateText {
				value: attribute_value(required(value, &action, "value")?),
				selector,
			},
			"updateevents" => Change::UpdateEvents {
				value: serde_json::from_value(required(value, &action, "value")?).map_err(decode_error)?,
				remove: remove.unwrap_or_default(),
				selector,
			},
			_ => Change::Unrecognized { selector, action },
		})
	}
}

#[derive(Deserialize)]
struct RawChange {
	#[serde(deserialize_with = "selector")]
	selector: String,
	action: String,
	#[serde(default)]
	value: Option<Value>,
	#[serde(default)]
	properties: Option<BTreeMap<String, Value>>,
	#[serde(default)]
	remove: Option<Vec<String>>,
}

/// Accepts both node ids and integer paths (`[1, 0]` is `"1-0"`, `[]` is the root).
fn selector<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum RawSelector {
		Id(String),
		Path(Vec<u32>),
	}

	Ok(match RawSelector::deserialize(deserializer)? {
		RawSelector::Id(id) => id,
		RawSelector::Path(path) if path.is_empty() => ROOT_ID.to_owned(),
		RawSelector::Path(path) => path.iter().map(u32::to_string).collect::<Vec<_>>().join("-"),
	})
}

/// Attribute and text values are strings on the wire, but scalars are tolerated.
fn attribute_value(value: Value) -> String {
	match value {
		Value::String(string) => string,
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

fn decode_error(error: serde_json::Error) -> Diagnostic {
	Diagnostic::Decode { reason: error.to_string() }
}

/// A decoded inbound JSON message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
	pub title: Option<String>,
	pub content: Content,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
	/// Replace the whole tree.
	Tree(Descriptor),
	/// Changes in application order, each still to be decoded with [`Change::decode`].
	Batch(Vec<Value>),
	/// Neither a tree nor a batch.
	Empty,
}

impl Message {
	/// Decodes a parsed inbound message. A tree takes precedence over a batch.
	///
	/// # Errors
	///
	/// Iff `raw` isn't an object or its `title`, `body` or `diff` are malformed.
	pub fn decode(raw: &Value) -> Result<Self, Diagnostic> {
		let object = raw.as_object().ok_or_else(|| Diagnostic::Decode {
			reason: "inbound message is not an object".to_owned(),
		})?;

		let title = match object.get("title") {
			None | Some(Value::Null) => None,
			Some(Value::String(title)) => Some(title.clone()),
			Some(_) => {
				return Err(Diagnostic::Decode {
					reason: "`title` is not a string".to_owned(),
				})
			}
		};

		let content = match (object.get("body"), object.get("diff")) {
			(Some(body), _) if !body.is_null() => Content::Tree(Descriptor::deserialize(body).map_err(decode_error)?),
			(_, Some(Value::Array(diff))) => Content::Batch(diff.clone()),
			(_, Some(diff)) if !diff.is_null() => {
				return Err(Diagnostic::Decode {
					reason: "`diff` is not a list".to_owned(),
				})
			}
			_ => Content::Empty,
		};

		Ok(Self { title, content })
	}
}

/// Addresses the server-side handler of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HandlerRef {
	Id(String),
	Path(Vec<u32>),
}
impl HandlerRef {
	/// `"root"` stays an id, dash-separated integers become a path, anything else is sent as the id.
	#[must_use]
	pub fn for_id(id: &str) -> Self {
		if id == ROOT_ID || id.is_empty() {
			return HandlerRef::Id(id.to_owned());
		}
		id.split('-')
			.map(str::parse)
			.collect::<Result<Vec<u32>, _>>()
			.map_or_else(|_| HandlerRef::Id(id.to_owned()), HandlerRef::Path)
	}
}

/// An interaction reported to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionEvent {
	pub handler: HandlerRef,
	pub name: String,
	pub payload: Value,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn element_and_text_descriptors() {
		let descriptor: Descriptor = serde_json::from_value(json!({
			"id": "root",
			"tag": "div",
			"events": ["click"],
			"children": [{ "id": "1-0", "text": "hi" }],
		}))
		.unwrap();

		match descriptor {
			Descriptor::Element(element) => {
				assert_eq!(element.tag, "div");
				assert!(element.attributes.is_empty());
				assert_eq!(element.events, ["click"]);
				assert_eq!(
					element.children,
					[Descriptor::Text(TextDescriptor {
						id: "1-0".to_owned(),
						text: "hi".to_owned()
					})]
				);
			}
			Descriptor::Text(_) => panic!("decoded an element as text"),
		}
	}

	#[test]
	fn path_selectors_become_ids() {
		let change = Change::decode(json!({ "action": "delete", "selector": [1, 0] })).unwrap();
		assert_eq!(change.selector(), "1-0");
		let change = Change::decode(json!({ "action": "delete", "selector": [] })).unwrap();
		assert_eq!(change.selector(), "root");
	}

	#[test]
	fn unknown_actions_are_kept_for_diagnosis() {
		let change = Change::decode(json!({ "action": "teleport", "selector": "1-0" })).unwrap();
		assert_eq!(
			change,
			Change::Unrecognized {
				selector: "1-0".to_owned(),
				action: "teleport".to_owned()
			}
		);
	}

	#[test]
	fn malformed_changes_are_decode_errors() {
		assert!(matches!(Change::decode(json!({ "action": "update", "selector": "root" })), Err(Diagnostic::Decode { .. })));
		assert!(matches!(Change::decode(json!({ "selector": "root" })), Err(Diagnostic::Decode { .. })));
	}

	#[test]
	fn scalar_properties_are_stringified() {
		let change = Change::decode(json!({
			"action": "updateproperties",
			"selector": "1-0",
			"properties": { "tabindex": 3, "hidden": true },
		}))
		.unwrap();
		match change {
			Change::UpdateProperties { properties, .. } => {
				assert_eq!(properties["tabindex"], "3");
				assert_eq!(properties["hidden"], "true");
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn body_takes_precedence_over_diff() {
		let message = Message::decode(&json!({
			"title": "Hello",
			"body": { "id": "root", "tag": "main" },
			"diff": [],
		}))
		.unwrap();
		assert_eq!(message.title.as_deref(), Some("Hello"));
		assert!(matches!(message.content, Content::Tree(_)));

		let message = Message::decode(&json!({ "title": "Hello" })).unwrap();
		assert_eq!(message.content, Content::Empty);
	}

	#[test]
	fn handler_refs() {
		assert_eq!(HandlerRef::for_id("root"), HandlerRef::Id("root".to_owned()));
		assert_eq!(HandlerRef::for_id("1-0-2"), HandlerRef::Path(vec![1, 0, 2]));
		assert_eq!(HandlerRef::for_id("save-button"), HandlerRef::Id("save-button".to_owned()));
		assert_eq!(serde_json::to_value(HandlerRef::for_id("3")).unwrap(), json!([3]));
	}

	#[test]
	fn handshake() {
		assert_eq!(handshake_frame(Some("abc")), "init+abc");
		assert_eq!(handshake_frame(None), "init+");
	}
}
