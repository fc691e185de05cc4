//! Node Registry: addresses live nodes by their server-assigned ids.
//!
//! Nodes are kept in a generational arena that mirrors the live tree's structure,
//! so that removing a subtree can evict every id inside it.
//! The id index is a non-owning lookup into that arena.

use hashbrown::HashMap;
use tracing::{trace, warn};

/// Arena address of one registered node.
///
/// Keys are never reused: a key whose node has been evicted stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
	index: u32,
	generation: u32,
}

/// Where [`NodeRegistry::link`] places a child among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAt {
	Start,
	End,
	Index(usize),
}

/// What [`NodeRegistry::evict`] removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
	/// Ids that stopped resolving, in post-order.
	pub ids: Vec<String>,
	pub parent: Option<NodeKey>,
	/// Former position among the parent's children.
	pub index: usize,
}

#[derive(Debug)]
struct Entry<N> {
	id: String,
	handle: N,
	parent: Option<NodeKey>,
	children: Vec<NodeKey>,
	events: Vec<String>,
}

#[derive(Debug)]
struct Slot<N> {
	generation: u32,
	entry: Option<Entry<N>>,
}

#[derive(Debug)]
pub struct NodeRegistry<N> {
	slots: Vec<Slot<N>>,
	free: Vec<u32>,
	ids: HashMap<String, NodeKey>,
}
impl<N> Default for NodeRegistry<N> {
	fn default() -> Self {
		Self::new()
	}
}
impl<N> NodeRegistry<N> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			slots: Vec::new(),
			free: Vec::new(),
			ids: HashMap::new(),
		}
	}

	/// Registers `handle` under `id`, unlinked.
	///
	/// An existing entry for `id` is overwritten in the index only: the previous node keeps its place in the arena
	/// (and is evicted along with its ancestors), but `id` no longer resolves to it.
	pub fn register(&mut self, id: &str, handle: N) -> NodeKey {
		let entry = Entry {
			id: id.to_owned(),
			handle,
			parent: None,
			children: Vec::new(),
			events: Vec::new(),
		};
		let key = match self.free.pop() {
			Some(index) => {
				let slot = &mut self.slots[index as usize];
				slot.entry = Some(entry);
				NodeKey { index, generation: slot.generation }
			}
			None => {
				let index = self.slots.len() as u32;
				self.slots.push(Slot { generation: 0, entry: Some(entry) });
				NodeKey { index, generation: 0 }
			}
		};
		if let Some(previous) = self.ids.insert(id.to_owned(), key) {
			if self.entry(previous).is_some() {
				warn!("Node id {:?} registered again; the previous node is no longer addressable.", id);
			}
		}
		key
	}

	#[must_use]
	pub fn lookup(&self, id: &str) -> Option<&N> {
		self.key_of(id).and_then(|key| self.handle(key))
	}

	#[must_use]
	pub fn key_of(&self, id: &str) -> Option<NodeKey> {
		self.ids.get(id).copied()
	}

	#[must_use]
	pub fn contains(&self, id: &str) -> bool {
		self.ids.contains_key(id)
	}

	#[must_use]
	pub fn handle(&self, key: NodeKey) -> Option<&N> {
		self.entry(key).map(|entry| &entry.handle)
	}

	#[must_use]
	pub fn id(&self, key: NodeKey) -> Option<&str> {
		self.entry(key).map(|entry| entry.id.as_str())
	}

	#[must_use]
	pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
		self.entry(key).and_then(|entry| entry.parent)
	}

	#[must_use]
	pub fn children(&self, key: NodeKey) -> &[NodeKey] {
		self.entry(key).map_or(&[], |entry| &entry.children)
	}

	/// The event names last declared for the node.
	#[must_use]
	pub fn events(&self, key: NodeKey) -> &[String] {
		self.entry(key).map_or(&[], |entry| &entry.events)
	}

	pub fn set_events(&mut self, key: NodeKey, events: Vec<String>) {
		if let Some(entry) = self.entry_mut(key) {
			entry.events = events;
		}
	}

	/// Number of addressable ids.
	#[must_use]
	pub fn len(&self) -> usize {
		self.ids.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	/// Number of nodes held by the arena, addressable or not.
	#[must_use]
	pub fn live_nodes(&self) -> usize {
		self.slots.len() - self.free.len()
	}

	/// Addressable nodes with their ids.
	pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &str)> + '_ {
		self.ids.iter().map(|(id, &key)| (key, id.as_str()))
	}

	/// Makes `child` a child of `parent`, unlinking it from any previous parent first.
	pub fn link(&mut self, parent: NodeKey, child: NodeKey, at: LinkAt) {
		if self.entry(parent).is_none() || self.entry(child).is_none() {
			return warn!("Tried to link a stale node key.");
		}
		self.unlink(child);
		if let Some(entry) = self.entry_mut(child) {
			entry.parent = Some(parent);
		}
		if let Some(entry) = self.entry_mut(parent) {
			let index = match at {
				LinkAt::Start => 0,
				LinkAt::End => entry.children.len(),
				LinkAt::Index(index) => index.min(entry.children.len()),
			};
			entry.children.insert(index, child);
		}
	}

	/// Removes the node at `key` and its whole subtree.
	///
	/// Only ids that still resolve into the subtree are evicted; ids that were re-registered elsewhere are left alone.
	pub fn evict(&mut self, key: NodeKey) -> Option<Eviction> {
		self.entry(key)?;
		let (parent, index) = self.unlink(key);

		let mut ids = Vec::new();
		let mut stack = vec![(key, false)];
		while let Some((key, expanded)) = stack.pop() {
			if !expanded {
				stack.push((key, true));
				stack.extend(self.children(key).iter().rev().map(|&child| (child, false)));
				continue;
			}

			let slot = &mut self.slots[key.index as usize];
			let entry = match slot.entry.take() {
				Some(entry) => entry,
				None => continue,
			};
			slot.generation = slot.generation.wrapping_add(1);
			self.free.push(key.index);

			if self.ids.get(&entry.id) == Some(&key) {
				self.ids.remove(&entry.id);
				ids.push(entry.id);
			}
		}
		trace!("Evicted {} id(s).", ids.len());

		Some(Eviction { ids, parent, index })
	}

	/// Evicts every child subtree of `key`, keeping `key` itself.
	pub fn evict_children(&mut self, key: NodeKey) -> Vec<String> {
		let children = self.children(key).to_vec();
		children.into_iter().filter_map(|child| self.evict(child)).flat_map(|eviction| eviction.ids).collect()
	}

	/// Evicts the node `id` resolves to, along with its subtree.
	///
	/// Returns the evicted node's handle.
	pub fn unregister(&mut self, id: &str) -> Option<N>
	where
		N: Clone,
	{
		let key = self.key_of(id)?;
		let handle = self.handle(key).cloned();
		self.evict(key);
		handle
	}

	pub fn clear(&mut self) {
		for slot in &mut self.slots {
			if slot.entry.take().is_some() {
				slot.generation = slot.generation.wrapping_add(1);
			}
		}
		self.free = (0..self.slots.len() as u32).collect();
		self.ids.clear();
	}

	fn unlink(&mut self, key: NodeKey) -> (Option<NodeKey>, usize) {
		let parent = match self.entry_mut(key).and_then(|entry| entry.parent.take()) {
			Some(parent) => parent,
			None => return (None, 0),
		};
		let index = match self.entry_mut(parent) {
			Some(entry) => match entry.children.iter().position(|&child| child == key) {
				Some(index) => {
					entry.children.remove(index);
					index
				}
				None => 0,
			},
			None => 0,
		};
		(Some(parent), index)
	}

	fn entry(&self, key: NodeKey) -> Option<&Entry<N>> {
		self.slots
			.get(key.index as usize)
			.filter(|slot| slot.generation == key.generation)
			.and_then(|slot| slot.entry.as_ref())
	}

	fn entry_mut(&mut self, key: NodeKey) -> Option<&mut Entry<N>> {
		self.slots
			.get_mut(key.index as usize)
			.filter(|slot| slot.generation == key.generation)
			.and_then(|slot| slot.entry.as_mut())
	}
}
