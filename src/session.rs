//! Session Channel: connection state, inbound frame dispatch and keep-alive.
//!
//! This is transport-agnostic. A driver (see [`crate::web`]) forwards socket events and timer ticks here,
//! one at a time, so every message is processed to completion before the next one starts.

use crate::{
	bridge::Outbound,
	config::Config,
	diff::BatchReport,
	dom::Dom,
	error::{Diagnostic, DomError},
	protocol::{handshake_frame, Content, Message, KEEP_ALIVE, KEEP_ALIVE_ACK},
	recorder::Recorder,
	tree::LiveTree,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
	Connecting,
	Open,
	Closed,
}

/// What handling one inbound frame amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
	/// The keep-alive acknowledgment, consumed.
	KeepAliveAck,
	/// A full tree replaced the previous one.
	Tree,
	Batch(BatchReport),
	/// The frame was dropped.
	Rejected(Diagnostic),
	/// The channel is closed.
	Discarded,
}

pub struct Session<D: Dom> {
	config: Config,
	state: ChannelState,
	tree: LiveTree<D>,
	recorder: Recorder<D::Node>,
}
impl<D: Dom> Session<D> {
	/// Starts in [`ChannelState::Connecting`], rendering into `container`.
	///
	/// With the debugger enabled, the panel is attached to the document body outside the rendered tree.
	/// If `container` is the body itself, the tree is rendered into a new element appended to it instead.
	pub fn new(config: Config, mut dom: D, container: D::Node, outbound: Outbound) -> Self {
		let container = if config.debug && container == dom.body() {
			separate_container(&mut dom).unwrap_or_else(|error| {
				error!("Could not create a container beside the debugger panel: {}", error);
				container
			})
		} else {
			container
		};
		let recorder = Recorder::new(config.debug, &mut dom);
		Self {
			config,
			state: ChannelState::Connecting,
			tree: LiveTree::new(dom, container, outbound),
			recorder,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	#[must_use]
	pub fn state(&self) -> ChannelState {
		self.state
	}

	pub fn tree(&self) -> &LiveTree<D> {
		&self.tree
	}

	pub fn tree_mut(&mut self) -> &mut LiveTree<D> {
		&mut self.tree
	}

	pub fn recorder(&self) -> &Recorder<D::Node> {
		&self.recorder
	}

	/// Enters [`ChannelState::Open`] and sends the handshake.
	///
	/// Returns whether the channel was opened. Outside of [`ChannelState::Connecting`] this does nothing and returns `false`.
	///
	/// # Errors
	///
	/// Iff the handshake couldn't be sent. The channel is open regardless.
	#[instrument(skip(self))]
	pub fn on_open(&mut self) -> Result<bool, Diagnostic> {
		if self.state != ChannelState::Connecting {
			warn!("Ignoring open in state {:?}.", self.state);
			return Ok(false);
		}
		self.state = ChannelState::Open;
		info!("Connection established.");
		self.tree.outbound.send(&handshake_frame(self.config.session_token.as_deref())).map_err(|error| {
			error!("Could not send the handshake: {}", error);
			Diagnostic::from(error)
		})?;
		Ok(true)
	}

	/// Sends a keep-alive if the channel is open. Returns whether one was sent.
	pub fn on_keep_alive_tick(&mut self) -> bool {
		if self.state != ChannelState::Open {
			trace!("Not open; skipping keep-alive.");
			return false;
		}
		match self.tree.outbound.send(KEEP_ALIVE) {
			Ok(()) => true,
			Err(error) => {
				warn!("Could not send keep-alive: {}", error);
				false
			}
		}
	}

	/// Handles one inbound frame to completion.
	#[instrument(skip_all, fields(len = frame.len()))]
	pub fn on_frame(&mut self, frame: &str) -> Received {
		if self.state == ChannelState::Closed {
			debug!("Discarding frame received after close.");
			return Received::Discarded;
		}
		if frame == KEEP_ALIVE_ACK {
			trace!("Keep-alive acknowledged.");
			return Received::KeepAliveAck;
		}

		let raw: Value = match serde_json::from_str(frame) {
			Ok(raw) => raw,
			Err(error) => return reject(Diagnostic::Decode { reason: error.to_string() }),
		};
		self.recorder.record_message(&mut self.tree.dom, raw.clone());

		let Message { title, content } = match Message::decode(&raw) {
			Ok(message) => message,
			Err(diagnostic) => return reject(diagnostic),
		};
		if let Some(title) = title {
			self.tree.dom.set_title(&title);
		}

		let received = match content {
			Content::Tree(body) => match self.tree.replace_tree(&body) {
				Ok(()) => Received::Tree,
				Err(diagnostic) => reject(diagnostic),
			},
			Content::Batch(changes) => Received::Batch(self.tree.apply_batch(changes)),
			Content::Empty => {
				return reject(Diagnostic::Decode {
					reason: "message has neither `body` nor `diff`".to_owned(),
				})
			}
		};

		if self.config.rebind_declared_events {
			self.tree.bind_declared_events();
		}
		let snapshot = self.tree.snapshot();
		self.recorder.record_state(&mut self.tree.dom, snapshot);
		received
	}

	/// A transport failure. The channel closes; reconnecting is up to the driver.
	pub fn on_error(&mut self, reason: &str) {
		error!("Transport error: {}", reason);
		self.state = ChannelState::Closed;
	}

	pub fn on_close(&mut self) {
		if self.state != ChannelState::Closed {
			info!("Connection closed.");
		}
		self.state = ChannelState::Closed;
	}

	/// Moves the debugger's cursor. The live tree is not touched.
	pub fn scrub(&mut self, index: usize) {
		self.recorder.scrub(&mut self.tree.dom, index);
	}

	/// Puts the snapshot at the debugger's cursor on screen, bypassing the registry.
	///
	/// Returns `false` if there's nothing to apply.
	pub fn apply_recorded_state(&mut self) -> bool {
		match self.recorder.selected_state().map(str::to_owned) {
			Some(state) => {
				self.tree.apply_raw_state(&state);
				true
			}
			None => false,
		}
	}
}

fn separate_container<D: Dom>(dom: &mut D) -> Result<D::Node, DomError> {
	let container = dom.create_element("div")?;
	let body = dom.body();
	dom.append_child(&body, &container)?;
	debug!("Rendering into a separate container so the debugger panel survives full trees.");
	Ok(container)
}

fn reject(diagnostic: Diagnostic) -> Received {
	error!("Dropping inbound message: {}", diagnostic);
	Received::Rejected(diagnostic)
}
