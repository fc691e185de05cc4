//! Listener Table: the event listener currently bound for each `(node id, event name)` pair.
//!
//! Bindings are stored by value together with the node they are attached to,
//! so that unbinding never depends on finding the same closure again.

use hashbrown::{hash_map::Entry, HashMap};
use tracing::trace;

#[derive(Debug)]
pub struct Binding<N, L> {
	pub node: N,
	pub listener: L,
}

#[derive(Debug)]
pub struct ListenerTable<N, L> {
	bindings: HashMap<String, HashMap<String, Binding<N, L>>>,
}
impl<N, L> Default for ListenerTable<N, L> {
	fn default() -> Self {
		Self::new()
	}
}
impl<N, L> ListenerTable<N, L> {
	#[must_use]
	pub fn new() -> Self {
		Self { bindings: HashMap::new() }
	}

	#[must_use]
	pub fn contains(&self, target: &str, event: &str) -> bool {
		self.bindings.get(target).map_or(false, |events| events.contains_key(event))
	}

	/// Stores a binding for `(target, event)`.
	///
	/// If the pair is already bound, nothing is stored and the rejected binding is handed back.
	pub fn insert(&mut self, target: &str, event: &str, binding: Binding<N, L>) -> Result<(), Binding<N, L>> {
		match self.bindings.entry(target.to_owned()).or_default().entry(event.to_owned()) {
			Entry::Occupied(_) => Err(binding),
			Entry::Vacant(vacant) => {
				vacant.insert(binding);
				trace!("Stored listener.");
				Ok(())
			}
		}
	}

	pub fn remove(&mut self, target: &str, event: &str) -> Option<Binding<N, L>> {
		let events = self.bindings.get_mut(target)?;
		let removed = events.remove(event);
		if events.is_empty() {
			self.bindings.remove(target);
		}
		removed
	}

	/// Removes all bindings of one node.
	pub fn take_node(&mut self, target: &str) -> Vec<(String, Binding<N, L>)> {
		self.bindings.remove(target).map(|events| events.into_iter().collect()).unwrap_or_default()
	}

	pub fn drain(&mut self) -> impl Iterator<Item = (String, String, Binding<N, L>)> + '_ {
		self.bindings
			.drain()
			.flat_map(|(target, events)| events.into_iter().map(move |(event, binding)| (target.clone(), event, binding)))
	}

	/// Event names currently bound on `target`.
	pub fn events_of<'a>(&'a self, target: &str) -> impl Iterator<Item = &'a str> + 'a {
		self.bindings.get(target).into_iter().flat_map(|events| events.keys().map(String::as_str))
	}

	/// Total number of bindings.
	#[must_use]
	pub fn len(&self) -> usize {
		self.bindings.values().map(HashMap::len).sum()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}
}
