//! The state one synchronized tree is made of.
//!
//! Materializing ([`LiveTree::materialize`], [`LiveTree::replace_tree`]), diffing ([`LiveTree::apply_batch`])
//! and event binding ([`LiveTree::bind`]) are implemented in their own modules on top of it.

use crate::{
	bridge::Outbound,
	closure_map::ListenerTable,
	dom::Dom,
	registry::{NodeKey, NodeRegistry},
};
use core::fmt::{self, Debug, Formatter};
use tracing::warn;

/// A host tree below a container node, together with the registry and listener table addressing it.
///
/// Every piece of mutable synchronization state is owned here rather than in globals,
/// so independent sessions don't share anything.
pub struct LiveTree<D: Dom> {
	pub(crate) dom: D,
	pub(crate) container: D::Node,
	pub(crate) root: Option<NodeKey>,
	pub(crate) registry: NodeRegistry<D::Node>,
	pub(crate) listeners: ListenerTable<D::Node, D::Listener>,
	pub(crate) outbound: Outbound,
}
impl<D: Dom> LiveTree<D> {
	/// Takes exclusive ownership of `container`'s content.
	pub fn new(dom: D, container: D::Node, outbound: Outbound) -> Self {
		Self {
			dom,
			container,
			root: None,
			registry: NodeRegistry::new(),
			listeners: ListenerTable::new(),
			outbound,
		}
	}

	pub fn dom(&self) -> &D {
		&self.dom
	}

	pub fn dom_mut(&mut self) -> &mut D {
		&mut self.dom
	}

	pub fn container(&self) -> &D::Node {
		&self.container
	}

	/// The node of the last full tree (or its replacement), if it's still present.
	pub fn root(&self) -> Option<&D::Node> {
		self.root.and_then(|key| self.registry.handle(key))
	}

	pub fn registry(&self) -> &NodeRegistry<D::Node> {
		&self.registry
	}

	pub fn listeners(&self) -> &ListenerTable<D::Node, D::Listener> {
		&self.listeners
	}

	pub fn lookup(&self, id: &str) -> Option<&D::Node> {
		self.registry.lookup(id)
	}

	/// Serializes the container's current content.
	pub fn snapshot(&self) -> String {
		self.dom.inner_html(&self.container)
	}

	/// Overwrites the container's content with raw markup.
	///
	/// Neither the registry nor the listener table are updated,
	/// so ids resolve to detached nodes until the next full tree arrives.
	pub fn apply_raw_state(&mut self, html: &str) {
		warn!("Replacing the tree with raw markup; node ids won't resolve to displayed nodes until the next full tree.");
		self.dom.set_inner_html(&self.container, html);
	}

	/// Evicts the subtree at `key` from the registry and unbinds the listeners of every id that stopped resolving.
	///
	/// The host nodes themselves are left alone.
	pub(crate) fn evict(&mut self, key: NodeKey) -> Option<crate::registry::Eviction> {
		let eviction = self.registry.evict(key)?;
		for id in &eviction.ids {
			self.unbind_node(id);
		}
		if self.root == Some(key) {
			self.root = None;
		}
		Some(eviction)
	}

	/// Like [`Self::evict`], but also discards the host node.
	pub(crate) fn discard(&mut self, key: NodeKey) {
		if let Some(node) = self.registry.handle(key).cloned() {
			self.evict(key);
			self.dom.remove(&node);
		}
	}
}

impl<D: Dom> Debug for LiveTree<D>
where
	D: Debug,
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("LiveTree")
			.field("dom", &self.dom)
			.field("container", &self.container)
			.field("ids", &self.registry.len())
			.field("listeners", &self.listeners.len())
			.finish()
	}
}
