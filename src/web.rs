//! Browser bindings: a [`Dom`] over [`web_sys`], a WebSocket [`Transport`] and the driver wiring both to a [`Session`].

use crate::{
	bridge::{Outbound, Transport},
	config::Config,
	dom::{Dom, EventCallback, EventDetails},
	error::{DomError, TransportError},
	session::Session,
};
use core::{cell::RefCell, convert::TryFrom};
use js_sys::Array;
use std::rc::{Rc, Weak};
use tracing::{error, info, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};
use web_sys::{CloseEvent, Document, Element, Event, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, MessageEvent, MouseEvent, Node, WebSocket};

fn js_error(value: JsValue) -> DomError {
	DomError::new(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

fn element(node: &Node) -> Result<&Element, DomError> {
	node.dyn_ref::<Element>().ok_or_else(|| DomError::new("not an element"))
}

fn input_value(target: &JsValue) -> Option<String> {
	if let Some(input) = target.dyn_ref::<HtmlInputElement>() {
		Some(input.value())
	} else if let Some(text_area) = target.dyn_ref::<HtmlTextAreaElement>() {
		Some(text_area.value())
	} else {
		target.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
	}
}

/// Extracts what the interaction bridge reports from a native event.
#[must_use]
pub fn event_details(event: &Event) -> EventDetails {
	EventDetails {
		pointer: event.dyn_ref::<MouseEvent>().map(|event| (event.client_x(), event.client_y())),
		value: event.target().and_then(|target| input_value(&target)),
	}
}

/// The browser's document.
#[derive(Debug, Clone)]
pub struct WebDom {
	document: Document,
}
impl WebDom {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self { document }
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}
}

impl Dom for WebDom {
	type Node = Node;
	type Listener = Closure<dyn FnMut(Event)>;

	fn body(&self) -> Node {
		match self.document.body() {
			Some(body) => body.into(),
			None => {
				warn!("Document has no body. Falling back to the document itself.");
				self.document.clone().into()
			}
		}
	}

	fn set_title(&mut self, title: &str) {
		self.document.set_title(title);
	}

	fn create_element(&mut self, tag: &str) -> Result<Node, DomError> {
		self.document.create_element(tag).map(Into::into).map_err(js_error)
	}

	fn create_text(&mut self, text: &str) -> Node {
		self.document.create_text_node(text).into()
	}

	fn is_element(&self, node: &Node) -> bool {
		node.dyn_ref::<Element>().is_some()
	}

	fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<(), DomError> {
		element(node)?.set_attribute(name, value).map_err(js_error)
	}

	fn remove_attribute(&mut self, node: &Node, name: &str) -> Result<(), DomError> {
		element(node)?.remove_attribute(name).map_err(js_error)
	}

	fn attribute_names(&self, node: &Node) -> Vec<String> {
		match node.dyn_ref::<Element>() {
			Some(element) => {
				let names: Array = element.get_attribute_names();
				names.iter().filter_map(|name| name.as_string()).collect()
			}
			None => Vec::new(),
		}
	}

	fn set_value(&mut self, node: &Node, value: &str) -> bool {
		if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
			input.set_value(value);
		} else if let Some(text_area) = node.dyn_ref::<HtmlTextAreaElement>() {
			text_area.set_value(value);
		} else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
			select.set_value(value);
		} else {
			return false;
		}
		true
	}

	fn append_child(&mut self, parent: &Node, child: &Node) -> Result<(), DomError> {
		parent.append_child(child).map(drop).map_err(js_error)
	}

	fn prepend_child(&mut self, parent: &Node, child: &Node) -> Result<(), DomError> {
		parent.insert_before(child, parent.first_child().as_ref()).map(drop).map_err(js_error)
	}

	fn replace(&mut self, old: &Node, new: &Node) -> Result<(), DomError> {
		let parent = old.parent_node().ok_or_else(|| DomError::new("node to replace has no parent"))?;
		parent.replace_child(new, old).map(drop).map_err(js_error)
	}

	fn remove(&mut self, node: &Node) {
		if let Some(parent) = node.parent_node() {
			if let Err(error) = parent.remove_child(node) {
				error!("Failed to remove node: {}", js_error(error));
			}
		}
	}

	fn set_text_content(&mut self, node: &Node, text: &str) {
		node.set_text_content(Some(text));
	}

	fn clear_children(&mut self, node: &Node) {
		node.set_text_content(None);
	}

	fn inner_html(&self, node: &Node) -> String {
		match node.dyn_ref::<Element>() {
			Some(element) => element.inner_html(),
			None => node.text_content().unwrap_or_default(),
		}
	}

	fn set_inner_html(&mut self, node: &Node, html: &str) {
		match node.dyn_ref::<Element>() {
			Some(element) => element.set_inner_html(html),
			None => error!("Can't set markup of a non-element."),
		}
	}

	fn listen(&mut self, node: &Node, event: &str, callback: EventCallback) -> Result<Self::Listener, DomError> {
		let listener = Closure::wrap(Box::new(move |event: Event| callback(&event_details(&event))) as Box<dyn FnMut(Event)>);
		node.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref()).map_err(js_error)?;
		Ok(listener)
	}

	fn unlisten(&mut self, node: &Node, event: &str, listener: Self::Listener) {
		if let Err(error) = node.remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref()) {
			warn!("Failed to remove event listener {:?}: {}", event, js_error(error));
		}
	}
}

/// The session's WebSocket, as seen by the interaction bridge.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
	socket: WebSocket,
}
impl WebSocketTransport {
	#[must_use]
	pub fn new(socket: WebSocket) -> Self {
		Self { socket }
	}
}
impl Transport for WebSocketTransport {
	fn send(&self, frame: &str) -> Result<(), TransportError> {
		if self.socket.ready_state() != WebSocket::OPEN {
			return Err(TransportError::Closed);
		}
		self.socket.send_with_str(frame).map_err(|error| TransportError::Send(js_error(error).to_string()))
	}
}

/// Reads the host page contract from the document element's attributes.
#[must_use]
pub fn config_from_document(document: &Document) -> Config {
	let root = document.document_element();
	Config::from_host_attributes(|name| root.as_ref().and_then(|root| root.get_attribute(name)))
}

struct KeepAlive {
	interval_id: i32,
	_tick: Closure<dyn FnMut()>,
}
impl Drop for KeepAlive {
	fn drop(&mut self) {
		if let Some(window) = web_sys::window() {
			window.clear_interval_with_handle(self.interval_id);
			trace!("Stopped keep-alive.");
		}
	}
}

struct SocketHandlers {
	_onopen: Closure<dyn FnMut(Event)>,
	_onmessage: Closure<dyn FnMut(MessageEvent)>,
	_onerror: Closure<dyn FnMut(Event)>,
	_onclose: Closure<dyn FnMut(CloseEvent)>,
}

type SharedSession = Rc<RefCell<Session<WebDom>>>;

/// A running session in the browser.
///
/// Dropping this detaches every socket handler and stops the keep-alive; use [`WebRuntime::forget`] to keep it running for the page's lifetime.
pub struct WebRuntime {
	session: SharedSession,
	socket: WebSocket,
	keep_alive: Rc<RefCell<Option<KeepAlive>>>,
	_handlers: SocketHandlers,
	_debugger_listeners: Vec<Closure<dyn FnMut(Event)>>,
}
impl WebRuntime {
	#[must_use]
	pub fn session(&self) -> &Rc<RefCell<Session<WebDom>>> {
		&self.session
	}

	/// Closes the socket and stops the keep-alive.
	pub fn close(&self) {
		if let Err(error) = self.socket.close() {
			warn!("Failed to close the socket: {}", js_error(error));
		}
		self.keep_alive.borrow_mut().take();
		self.session.borrow_mut().on_close();
	}

	/// Leaks the runtime so that it keeps running until the page unloads.
	pub fn forget(self) {
		core::mem::forget(self);
	}
}
impl Drop for WebRuntime {
	fn drop(&mut self) {
		self.socket.set_onopen(None);
		self.socket.set_onmessage(None);
		self.socket.set_onerror(None);
		self.socket.set_onclose(None);
	}
}

/// Runs `f` on the session unless it's gone or already busy.
fn with_session<R>(session: &Weak<RefCell<Session<WebDom>>>, f: impl FnOnce(&mut Session<WebDom>) -> R) -> Option<R> {
	let session = match session.upgrade() {
		Some(session) => session,
		None => {
			trace!("Session dropped.");
			return None;
		}
	};
	let mut session = match session.try_borrow_mut() {
		Ok(session) => session,
		Err(_) => {
			error!("Re-entrant session access. Ignoring event.");
			return None;
		}
	};
	Some(f(&mut session))
}

fn start_keep_alive(session: Weak<RefCell<Session<WebDom>>>, interval: core::time::Duration) -> Result<KeepAlive, JsValue> {
	let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
	let tick = Closure::wrap(Box::new(move || {
		with_session(&session, Session::on_keep_alive_tick);
	}) as Box<dyn FnMut()>);
	let interval_id = window.set_interval_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), i32::try_from(interval.as_millis()).unwrap_or(i32::MAX))?;
	Ok(KeepAlive { interval_id, _tick: tick })
}

/// Opens the session socket for the current page and starts synchronizing into the configured container.
///
/// # Errors
///
/// Iff there is no window or document, the container doesn't exist, or the socket can't be created.
#[instrument(skip(config))]
pub fn connect(config: Config) -> Result<WebRuntime, JsValue> {
	let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
	let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
	let location = window.location();
	let url = config.socket_url(&location.protocol()?, &location.host()?);

	let dom = WebDom::new(document.clone());
	let container: Node = match &config.container_id {
		Some(id) => document.get_element_by_id(id).ok_or_else(|| JsValue::from_str(&format!("no element with id {:?}", id)))?.into(),
		None => dom.body(),
	};

	info!("Connecting to {}.", url);
	let socket = WebSocket::new(&url)?;
	let outbound: Outbound = Rc::new(WebSocketTransport::new(socket.clone()));
	let heartbeat_interval = config.heartbeat_interval;
	let session: SharedSession = Rc::new(RefCell::new(Session::new(config, dom, container, outbound)));
	let keep_alive = Rc::new(RefCell::new(None));

	let onopen = {
		let session = Rc::downgrade(&session);
		let keep_alive = Rc::clone(&keep_alive);
		Closure::wrap(Box::new(move |_: Event| {
			let opened = with_session(&session, |session| match session.on_open() {
				Ok(opened) => opened,
				Err(diagnostic) => {
					warn!("{}", diagnostic);
					true
				}
			});
			if opened != Some(true) {
				return;
			}
			match start_keep_alive(session.clone(), heartbeat_interval) {
				Ok(started) => *keep_alive.borrow_mut() = Some(started),
				Err(error) => error!("Failed to start keep-alive: {}", js_error(error)),
			}
		}) as Box<dyn FnMut(Event)>)
	};
	let onmessage = {
		let session = Rc::downgrade(&session);
		Closure::wrap(Box::new(move |event: MessageEvent| match event.data().as_string() {
			Some(frame) => {
				with_session(&session, |session| session.on_frame(&frame));
			}
			None => warn!("Ignoring non-text frame."),
		}) as Box<dyn FnMut(MessageEvent)>)
	};
	let onerror = {
		let session = Rc::downgrade(&session);
		Closure::wrap(Box::new(move |event: Event| {
			with_session(&session, |session| session.on_error(&event.type_()));
		}) as Box<dyn FnMut(Event)>)
	};
	let onclose = {
		let session = Rc::downgrade(&session);
		let keep_alive = Rc::clone(&keep_alive);
		Closure::wrap(Box::new(move |event: CloseEvent| {
			info!("Socket closed with code {}.", event.code());
			keep_alive.borrow_mut().take();
			with_session(&session, Session::on_close);
		}) as Box<dyn FnMut(CloseEvent)>)
	};

	socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
	socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
	socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
	socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));

	let debugger_listeners = bind_debugger(&session);

	Ok(WebRuntime {
		session,
		socket,
		keep_alive,
		_handlers: SocketHandlers {
			_onopen: onopen,
			_onmessage: onmessage,
			_onerror: onerror,
			_onclose: onclose,
		},
		_debugger_listeners: debugger_listeners,
	})
}

/// Wires the debugger panel's slider and apply button, if the panel exists.
fn bind_debugger(session: &SharedSession) -> Vec<Closure<dyn FnMut(Event)>> {
	let panel = match session.borrow().recorder().panel().cloned() {
		Some(panel) => panel,
		None => return Vec::new(),
	};

	let scrub: EventCallback = {
		let session = Rc::downgrade(session);
		Box::new(move |details| match details.value.as_deref().map(str::parse::<usize>) {
			Some(Ok(index)) => {
				with_session(&session, |session| session.scrub(index));
			}
			_ => warn!("Unreadable debugger position {:?}.", details.value),
		})
	};
	let apply: EventCallback = {
		let session = Rc::downgrade(session);
		Box::new(move |_| {
			with_session(&session, |session| {
				if !session.apply_recorded_state() {
					warn!("No recorded state at the debugger's position.");
				}
			});
		})
	};

	let mut listeners = Vec::with_capacity(2);
	let mut session = session.borrow_mut();
	let dom = session.tree_mut().dom_mut();
	for (node, event, callback) in vec![(&panel.slider, "input", scrub), (&panel.apply, "click", apply)] {
		match dom.listen(node, event, callback) {
			Ok(listener) => listeners.push(listener),
			Err(error) => error!("Failed to wire the debugger panel: {}", error),
		}
	}
	listeners
}

/// Entry point for host pages: configures itself from the document and runs until the page unloads.
///
/// # Errors
///
/// See [`connect`].
#[wasm_bindgen]
pub fn start() -> Result<(), JsValue> {
	let document = web_sys::window().and_then(|window| window.document()).ok_or_else(|| JsValue::from_str("no document"))?;
	connect(config_from_document(&document))?.forget();
	Ok(())
}
