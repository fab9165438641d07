//! WebSocket transport and the periodic rescan.
//!
//! Everything runs on the page's event loop. Each callback borrows the
//! agent, hands it one event, and flushes the queued requests before
//! returning.

use std::cell::RefCell;
use std::rc::Rc;

use cr_agent::AgentSession;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, MessageEvent, WebSocket, Window};

use crate::dom::WebDom;

/// Delay before reconnecting after the socket closes.
const RECONNECT_DELAY_MS: i32 = 1000;

/// Period of the document rescan that picks up `<link>`s added later.
const REFRESH_INTERVAL_MS: i32 = 1000;

/// Socket callbacks, dropped when the socket is replaced.
struct Handlers {
    _message: Closure<dyn FnMut(MessageEvent)>,
    _close: Closure<dyn FnMut(CloseEvent)>,
}

/// Agent state shared by the browser callbacks.
pub(crate) struct Agent {
    session: AgentSession<WebDom>,
    url: String,
    socket: Option<WebSocket>,
    handlers: Option<Handlers>,
}

pub(crate) type SharedAgent = Rc<RefCell<Agent>>;

impl Agent {
    pub(crate) fn shared(session: AgentSession<WebDom>, url: &str) -> SharedAgent {
        Rc::new(RefCell::new(Self {
            session,
            url: url.to_owned(),
            socket: None,
            handlers: None,
        }))
    }

    /// Send queued requests while the socket is open.
    ///
    /// Requests queued while disconnected are replayed by the session on
    /// the next `connected`.
    fn flush(&mut self) {
        let Some(socket) = self
            .socket
            .as_ref()
            .filter(|socket| socket.ready_state() == WebSocket::OPEN)
        else {
            return;
        };
        for request in self.session.take_requests() {
            if let Err(e) = socket.send_with_str(&request.to_json()) {
                tracing::debug!(path = %request.path(), error = ?e, "Send failed");
            }
        }
    }
}

/// Open the socket and wire its callbacks.
///
/// A closed socket reconnects after [`RECONNECT_DELAY_MS`].
pub(crate) fn connect(agent: &SharedAgent, window: &Window) -> Result<(), JsValue> {
    let url = agent.borrow().url.clone();
    let socket = WebSocket::new(&url)?;

    let on_message = {
        let agent = Rc::clone(agent);
        Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let Some(text) = event.data().as_string() else {
                return;
            };
            let mut agent = agent.borrow_mut();
            agent.session.handle_message(&text);
            agent.flush();
        })
    };
    socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

    let on_close = {
        let agent = Rc::clone(agent);
        let window = window.clone();
        Closure::<dyn FnMut(CloseEvent)>::new(move |_: CloseEvent| {
            {
                let mut agent = agent.borrow_mut();
                agent.session.disconnected();
                agent.socket = None;
            }
            schedule_reconnect(&agent, &window);
        })
    };
    socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

    let mut state = agent.borrow_mut();
    state.socket = Some(socket);
    state.handlers = Some(Handlers {
        _message: on_message,
        _close: on_close,
    });
    Ok(())
}

fn schedule_reconnect(agent: &SharedAgent, window: &Window) {
    let retry = {
        let agent = Rc::clone(agent);
        let window = window.clone();
        Closure::once_into_js(move || {
            if let Err(e) = connect(&agent, &window) {
                tracing::warn!(error = ?e, "Reconnect failed");
                schedule_reconnect(&agent, &window);
            }
        })
    };
    if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        retry.unchecked_ref(),
        RECONNECT_DELAY_MS,
    ) {
        tracing::warn!(error = ?e, "Could not schedule reconnect");
    }
}

/// Rescan the document every [`REFRESH_INTERVAL_MS`].
pub(crate) fn start_refresh(agent: &SharedAgent, window: &Window) -> Result<(), JsValue> {
    let tick = {
        let agent = Rc::clone(agent);
        Closure::<dyn FnMut()>::new(move || {
            let mut agent = agent.borrow_mut();
            agent.session.refresh();
            agent.flush();
        })
    };
    window.set_interval_with_callback_and_timeout_and_arguments_0(
        tick.as_ref().unchecked_ref(),
        REFRESH_INTERVAL_MS,
    )?;
    // Lives as long as the page.
    tick.forget();
    Ok(())
}
