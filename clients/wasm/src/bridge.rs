//! WASM bridge: browser implementations of the channel capabilities.
//!
//! ## Threading model
//!
//! WASM is single-threaded. Callbacks only enqueue; the console is only
//! touched from `CraneConsoleClient::poll()`.
//!
//! ```text
//! JS main frame
//! ─────────────────────────────────────────────────────────
//! CraneConsoleClient::poll()
//!   drains queue  →  Console::apply / Console::reconnect_due
//!
//! web_sys::WebSocket callbacks (onopen / onmessage / onclose / onerror)
//!   push ClientEvent::Link { generation, .. } into queue
//!
//! window.setTimeout (reconnect)
//!   pushes ClientEvent::ReconnectDue into queue
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crane_console::{ChannelError, Connector, LinkEvent, ReconnectTimer, Socket};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::events::ClientEvent;

pub type EventQueue = Rc<RefCell<VecDeque<ClientEvent>>>;

pub fn js_error(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

pub struct BrowserConnector {
    queue: EventQueue,
    generation: u64,
}

impl BrowserConnector {
    pub fn new(queue: EventQueue) -> Self {
        Self {
            queue,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Connector for BrowserConnector {
    type Socket = BrowserSocket;

    fn open(&mut self, url: &str) -> Result<BrowserSocket, ChannelError> {
        let ws = web_sys::WebSocket::new(url).map_err(|e| ChannelError::open(url, js_error(&e)))?;
        ws.set_binary_type(web_sys::BinaryType::Arraybuffer);
        self.generation += 1;
        let generation = self.generation;

        // ----- onopen -------------------------------------------------------
        let queue = self.queue.clone();
        let onopen = Closure::<dyn FnMut()>::new(move || {
            log::info!("[bridge] WebSocket #{generation} open");
            queue
                .borrow_mut()
                .push_back(ClientEvent::link(generation, LinkEvent::Opened));
        });
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));

        // ----- onmessage ----------------------------------------------------
        let queue = self.queue.clone();
        let onmessage =
            Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |ev: web_sys::MessageEvent| {
                match ev.data().as_string() {
                    Some(text) => queue
                        .borrow_mut()
                        .push_back(ClientEvent::link(generation, LinkEvent::Frame(text))),
                    None => log::debug!("[bridge] Ignoring non-text frame"),
                }
            });
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        // ----- onerror ------------------------------------------------------
        let queue = self.queue.clone();
        let onerror = Closure::<dyn FnMut(web_sys::Event)>::new(move |_ev: web_sys::Event| {
            queue.borrow_mut().push_back(ClientEvent::link(
                generation,
                LinkEvent::Error("WebSocket error".into()),
            ));
        });
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        // ----- onclose ------------------------------------------------------
        let queue = self.queue.clone();
        let onclose = Closure::<dyn FnMut(web_sys::CloseEvent)>::new(move |ev: web_sys::CloseEvent| {
            let reason = format!("{} {}", ev.code(), ev.reason());
            queue.borrow_mut().push_back(ClientEvent::link(
                generation,
                LinkEvent::Closed(reason.trim().to_owned()),
            ));
        });
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));

        Ok(BrowserSocket {
            ws,
            _onopen: onopen,
            _onmessage: onmessage,
            _onerror: onerror,
            _onclose: onclose,
        })
    }
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// Owns the WebSocket and keeps its closures alive.
pub struct BrowserSocket {
    ws: web_sys::WebSocket,
    _onopen: Closure<dyn FnMut()>,
    _onmessage: Closure<dyn FnMut(web_sys::MessageEvent)>,
    _onerror: Closure<dyn FnMut(web_sys::Event)>,
    _onclose: Closure<dyn FnMut(web_sys::CloseEvent)>,
}

impl Socket for BrowserSocket {
    fn send_text(&mut self, text: &str) -> Result<(), ChannelError> {
        self.ws
            .send_with_str(text)
            .map_err(|e| ChannelError::Send(js_error(&e)))
    }

    fn close(&mut self) {
        let _ = self.ws.close();
    }
}

impl Drop for BrowserSocket {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        let _ = self.ws.close();
    }
}

// ---------------------------------------------------------------------------
// Reconnect timer
// ---------------------------------------------------------------------------

/// One `setTimeout` at a time.
pub struct BrowserTimer {
    queue: EventQueue,
    handle: Option<i32>,
    callback: Option<Closure<dyn FnMut()>>,
}

impl BrowserTimer {
    pub fn new(queue: EventQueue) -> Self {
        Self {
            queue,
            handle: None,
            callback: None,
        }
    }
}

impl ReconnectTimer for BrowserTimer {
    fn schedule(&mut self, delay: Duration) {
        self.cancel();
        let Some(window) = web_sys::window() else {
            log::error!("[bridge] No window; cannot schedule reconnect");
            return;
        };
        let queue = self.queue.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            queue.borrow_mut().push_back(ClientEvent::ReconnectDue);
        });
        let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            ms,
        ) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.callback = Some(callback);
            }
            Err(e) => log::error!("[bridge] setTimeout failed: {}", js_error(&e)),
        }
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(handle);
            }
        }
        self.callback = None;
    }
}
