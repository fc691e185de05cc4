//! Startup configuration, read once from the host page.

use core::time::Duration;

/// Attribute of the document element carrying the session token sent with the handshake.
pub const SESSION_TOKEN_ATTRIBUTE: &str = "data-session-token";

/// Attribute of the document element enabling the time-travel debugger.
pub const DEBUG_ATTRIBUTE: &str = "data-debug";

/// Attribute of the document element naming the id of the element to render into.
pub const CONTAINER_ATTRIBUTE: &str = "data-container";

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_SOCKET_PATH: &str = "/ws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub session_token: Option<String>,
	/// Enables the time-travel debugger. Fixed for the lifetime of a session.
	pub debug: bool,
	pub heartbeat_interval: Duration,
	pub socket_path: String,
	/// Id of the element to render into. The document body is used if unset.
	pub container_id: Option<String>,
	/// Bind every declared but unbound event after each message,
	/// which includes event names introduced by `updateevents` changes.
	pub rebind_declared_events: bool,
}
impl Default for Config {
	fn default() -> Self {
		Self {
			session_token: None,
			debug: false,
			heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
			socket_path: DEFAULT_SOCKET_PATH.to_owned(),
			container_id: None,
			rebind_declared_events: false,
		}
	}
}
impl Config {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads the host page contract through `attribute`, which looks up attributes of the document element.
	#[must_use]
	pub fn from_host_attributes(attribute: impl Fn(&str) -> Option<String>) -> Self {
		Self {
			session_token: attribute(SESSION_TOKEN_ATTRIBUTE),
			debug: attribute(DEBUG_ATTRIBUTE).map_or(false, |flag| is_enabled_flag(&flag)),
			container_id: attribute(CONTAINER_ATTRIBUTE).filter(|id| !id.is_empty()),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
		self.session_token = Some(token.into());
		self
	}

	#[must_use]
	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	#[must_use]
	pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
		self.heartbeat_interval = interval;
		self
	}

	#[must_use]
	pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
		self.socket_path = path.into();
		self
	}

	#[must_use]
	pub fn with_container_id(mut self, id: impl Into<String>) -> Self {
		self.container_id = Some(id.into());
		self
	}

	#[must_use]
	pub fn with_rebind_declared_events(mut self, rebind: bool) -> Self {
		self.rebind_declared_events = rebind;
		self
	}

	/// The socket URL for a page served over `page_protocol` (e.g. `"https:"`) from `host`.
	#[must_use]
	pub fn socket_url(&self, page_protocol: &str, host: &str) -> String {
		let scheme = if page_protocol == "https:" { "wss:" } else { "ws:" };
		format!("{}//{}{}", scheme, host, self.socket_path)
	}
}

/// Boolean host attributes are on when present, unless spelled `"false"` or `"0"`.
fn is_enabled_flag(value: &str) -> bool {
	!matches!(value.trim(), "false" | "0")
}
