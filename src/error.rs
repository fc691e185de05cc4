//! Diagnostics raised while synchronizing.
//!
//! None of these are fatal. Each one is logged where it happens and handed back to the caller
//! so that the remainder of a batch (or the next message) can proceed.

/// A failed host-tree operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DomError(pub String);
impl DomError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

/// Why an outbound frame could not be sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	/// The connection isn't (or is no longer) open.
	#[error("connection is not open")]
	Closed,
	#[error("send failed: {0}")]
	Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
	/// A malformed inbound payload, or a malformed change inside a batch.
	#[error("could not decode inbound payload: {reason}")]
	Decode { reason: String },
	/// The selector doesn't name a registered node.
	#[error("no node found for selector {selector:?} ({action})")]
	MissingNode { selector: String, action: String },
	/// The server sent an action this client doesn't know.
	#[error("unknown diff action {action:?} for selector {selector:?}")]
	UnknownAction { selector: String, action: String },
	/// The action can't be applied to the addressed node, or the host tree refused it.
	#[error("cannot apply {action} to {selector:?}: {reason}")]
	InvalidTarget { selector: String, action: String, reason: String },
	#[error(transparent)]
	Transport(#[from] TransportError),
}
