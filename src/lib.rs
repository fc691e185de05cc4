#![doc(html_root_url = "https://docs.rs/remote-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Keeps a browser document in sync with a UI tree that lives on a server.
//!
//! The server pushes either a whole tree or an ordered batch of addressed changes over a persistent socket.
//! [`session::Session`] applies them to a [`tree::LiveTree`], which owns the host nodes (through the [`dom::Dom`] seam),
//! the [`registry::NodeRegistry`] that addresses them by id, and the listeners that report user interactions back.
//!
//! [`web`] drives all of this in the browser. [`memory::MemoryDom`] is a headless tree for driving it anywhere else.
//!
//! # Logging
//!
//! Everything is instrumented with [`tracing`].
//! Attribute values, text and outgoing interaction payloads are only logged with the `dangerous-logging` feature enabled.

pub mod bridge;
pub mod closure_map;
pub mod config;
pub mod diff;
pub mod dom;
pub mod error;
mod materialize;
pub mod memory;
pub mod protocol;
pub mod recorder;
pub mod registry;
pub mod session;
pub mod tree;
pub mod web;

pub use crate::{
	bridge::{Outbound, Transport},
	config::Config,
	diff::BatchReport,
	dom::{Dom, EventDetails},
	error::{Diagnostic, DomError, TransportError},
	session::{ChannelState, Received, Session},
	tree::LiveTree,
};
