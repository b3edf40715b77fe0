//! Browser driver
//!
//! Owns the per-match resources the sim core can't: the WebSocket, the 50 ms
//! interval and the JS closures behind them. All of it is released from one
//! place, [`Driver::teardown`], so the socket closes exactly once and no timer
//! outlives its match.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{KeyboardEvent, MessageEvent, Request, RequestInit, Response, VisibilityState, WebSocket};

use super::MatchGeneration;
use crate::Millis;
use crate::consts::TICK_INTERVAL_MS;
use crate::error::{StartError, TransportError};
use crate::protocol::MatchStartPayload;
use crate::settings::Settings;
use crate::sim::{Applied, KeyEdge, NoteId, Session};

/// Milliseconds from `performance.now()`
pub fn performance_now() -> Millis {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

/// Logger and panic hook
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
}

type SocketHandler = Closure<dyn FnMut(JsValue)>;

struct Driver {
    session: Session,
    generation: MatchGeneration,
    socket: Option<WebSocket>,
    interval: Option<i32>,
    socket_handlers: Vec<SocketHandler>,
    tick_handler: Option<Closure<dyn FnMut()>>,
}

impl Driver {
    fn new(settings: Settings) -> Self {
        Self {
            session: Session::new(settings),
            generation: MatchGeneration::default(),
            socket: None,
            interval: None,
            socket_handlers: Vec::new(),
            tick_handler: None,
        }
    }

    /// Send everything the session has queued
    fn flush(&mut self) {
        let outbound = self.session.drain_outbound();
        let Some(socket) = &self.socket else {
            if !outbound.is_empty() {
                log::debug!("Dropping {} messages, no socket", outbound.len());
            }
            return;
        };
        for msg in outbound {
            match msg.encode() {
                Ok(text) => {
                    if let Err(e) = socket.send_with_str(&text) {
                        log::warn!("Send failed: {:?}", e);
                    }
                }
                Err(e) => log::error!("Could not encode {:?}: {}", msg, e),
            }
        }
    }

    fn stop_interval(&mut self) {
        if let Some(id) = self.interval.take() {
            if let Some(window) = web_sys::window() {
                window.clear_interval_with_handle(id);
            }
        }
    }

    /// Stop the tick and close the socket. Safe to call repeatedly; closures
    /// stay alive until the driver is reset since one may be running now.
    fn teardown(&mut self) {
        self.stop_interval();
        if let Some(socket) = self.socket.take() {
            socket.set_onopen(None);
            socket.set_onmessage(None);
            socket.set_onerror(None);
            socket.set_onclose(None);
            if let Err(e) = socket.close() {
                log::warn!("Socket close failed: {:?}", e);
            }
            self.session.socket_closed();
        }
    }
}

/// The driver, if it is still alive and still running match `generation`
fn live(weak: &Weak<RefCell<Driver>>, generation: MatchGeneration) -> Option<Rc<RefCell<Driver>>> {
    let driver = weak.upgrade()?;
    if !driver.borrow().generation.is(generation) {
        log::debug!("Dropping callback from a replaced match");
        return None;
    }
    Some(driver)
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle the rendering layer holds on to
#[wasm_bindgen]
pub struct BongaloonsClient {
    driver: Rc<RefCell<Driver>>,
}

#[wasm_bindgen]
impl BongaloonsClient {
    #[wasm_bindgen(constructor)]
    pub fn new() -> BongaloonsClient {
        let driver = Rc::new(RefCell::new(Driver::new(Settings::load())));
        setup_input_handlers(Rc::downgrade(&driver));
        setup_auto_pause(Rc::downgrade(&driver));
        BongaloonsClient { driver }
    }

    /// Run the handshake and start a match. Any previous match is ended.
    pub fn start(&self) {
        let generation = {
            let mut d = self.driver.borrow_mut();
            d.session.end_game();
            d.flush();
            d.teardown();
            d.socket_handlers.clear();
            d.tick_handler = None;
            let settings = d.session.settings().clone();
            d.session = Session::new(settings);
            d.session.begin_handshake();
            d.generation.advance()
        };
        let weak = Rc::downgrade(&self.driver);
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = run_handshake(weak.clone(), generation).await {
                if let Some(driver) = live(&weak, generation) {
                    let mut d = driver.borrow_mut();
                    d.session.transport_failed(&e);
                    d.teardown();
                }
            }
        });
    }

    /// Current render snapshot as JSON
    pub fn snapshot_json(&self) -> String {
        let d = self.driver.borrow();
        serde_json::to_string(&d.session.snapshot(performance_now())).unwrap_or_else(|e| {
            log::error!("Snapshot encode failed: {}", e);
            String::from("null")
        })
    }

    /// Returns the new paused flag
    pub fn toggle_pause(&self) -> bool {
        let mut d = self.driver.borrow_mut();
        let paused = d.session.toggle_pause(performance_now()).unwrap_or(false);
        d.flush();
        paused
    }

    /// How long the current pause has lasted
    pub fn paused_for_ms(&self) -> f64 {
        self.driver.borrow().session.paused_for(performance_now())
    }

    /// Hide a note once the renderer has resolved it
    pub fn retire(&self, id: usize) {
        self.driver.borrow_mut().session.retire(NoteId(id));
    }

    pub fn end_game(&self) {
        let mut d = self.driver.borrow_mut();
        d.session.end_game();
        d.flush();
        d.teardown();
    }
}

impl Default for BongaloonsClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn fetch_text(request: JsValue, stage: fn(String) -> TransportError) -> Result<(String, bool), TransportError> {
    let window = web_sys::window().ok_or_else(|| stage("no window".into()))?;
    let promise = match request.dyn_into::<Request>() {
        Ok(req) => window.fetch_with_request(&req),
        Err(url) => window.fetch_with_str(&url.as_string().unwrap_or_default()),
    };
    let resp: Response = JsFuture::from(promise)
        .await
        .map_err(|e| stage(format!("{:?}", e)))?
        .dyn_into()
        .map_err(|e| stage(format!("{:?}", e)))?;
    let ok = resp.ok();
    let text_promise = resp.text().map_err(|e| stage(format!("{:?}", e)))?;
    let text = JsFuture::from(text_promise)
        .await
        .map_err(|e| stage(format!("{:?}", e)))?
        .as_string()
        .unwrap_or_default();
    Ok((text, ok))
}

/// Health check, then open the socket. The start request is issued from the
/// socket's open handler.
async fn run_handshake(weak: Weak<RefCell<Driver>>, generation: MatchGeneration) -> Result<(), TransportError> {
    let Some(driver) = live(&weak, generation) else { return Ok(()) };
    let settings = driver.borrow().session.settings().clone();
    drop(driver);

    let (_, ok) = fetch_text(settings.health_url().into(), TransportError::HealthCheck).await?;
    if !ok {
        return Err(TransportError::HealthCheck("backend not healthy".into()));
    }

    let Some(driver) = live(&weak, generation) else { return Ok(()) };
    let mut d = driver.borrow_mut();
    if !d.session.health_ok() {
        return Ok(());
    }
    // One socket per match
    d.teardown();

    log::info!("Opening {}", settings.socket_url());
    let socket = WebSocket::new(&settings.socket_url()).map_err(|e| TransportError::Socket(format!("{:?}", e)))?;

    let on_open = {
        let weak = weak.clone();
        SocketHandler::new(move |_: JsValue| {
            let Some(driver) = live(&weak, generation) else { return };
            if !driver.borrow_mut().session.socket_opened() {
                return;
            }
            let weak = weak.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = request_start(weak.clone(), generation).await {
                    if let Some(driver) = live(&weak, generation) {
                        let mut d = driver.borrow_mut();
                        d.session.transport_failed(&e);
                        d.teardown();
                    }
                }
            });
        })
    };
    let on_message = {
        let weak = weak.clone();
        SocketHandler::new(move |event: JsValue| {
            let Some(driver) = live(&weak, generation) else { return };
            let Some(text) = event.dyn_into::<MessageEvent>().ok().and_then(|m| m.data().as_string()) else {
                return;
            };
            let mut d = driver.borrow_mut();
            match d.session.apply_text(&text) {
                Ok(Applied::GameOver) => {
                    d.stop_interval();
                }
                Ok(_) => {}
                Err(e) => log::warn!("Bad frame from backend: {}", e),
            }
        })
    };
    let on_error = {
        let weak = weak.clone();
        SocketHandler::new(move |_: JsValue| {
            let Some(driver) = live(&weak, generation) else { return };
            let mut d = driver.borrow_mut();
            d.session.transport_failed(&TransportError::Socket("socket error".into()));
            d.teardown();
        })
    };
    let on_close = {
        let weak = weak.clone();
        SocketHandler::new(move |_: JsValue| {
            let Some(driver) = live(&weak, generation) else { return };
            let mut d = driver.borrow_mut();
            d.session.socket_closed();
            d.teardown();
        })
    };

    socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));
    d.socket_handlers = vec![on_open, on_message, on_error, on_close];
    d.socket = Some(socket);
    Ok(())
}

/// POST the start request and begin the driver tick
async fn request_start(weak: Weak<RefCell<Driver>>, generation: MatchGeneration) -> Result<(), TransportError> {
    let Some(driver) = live(&weak, generation) else { return Ok(()) };
    if !driver.borrow().session.may_request_start() {
        return Ok(());
    }
    let url = driver.borrow().session.settings().start_url();
    drop(driver);

    let opts = RequestInit::new();
    opts.set_method("POST");
    let request = Request::new_with_str_and_init(&url, &opts)
        .map_err(|e| TransportError::StartRequest(format!("{:?}", e)))?;
    let (body, ok) = fetch_text(request.into(), TransportError::StartRequest).await?;
    if !ok {
        return Err(TransportError::StartRequest(format!("bad status: {}", body)));
    }
    let payload = MatchStartPayload::decode(&body).map_err(|e| TransportError::Decode(e.to_string()))?;

    let Some(driver) = live(&weak, generation) else { return Ok(()) };
    let mut d = driver.borrow_mut();
    match d.session.start_match(&payload, performance_now()) {
        Ok(()) => {}
        // Already logged by the session; the running match (if any) is kept
        Err(StartError::SocketNotReady) => return Ok(()),
        Err(_) => {
            d.teardown();
            return Ok(());
        }
    }

    let tick = {
        let weak = weak.clone();
        Closure::<dyn FnMut()>::new(move || {
            let Some(driver) = live(&weak, generation) else { return };
            let mut d = driver.borrow_mut();
            d.session.tick(performance_now());
            d.flush();
            if !d.session.is_running() {
                d.stop_interval();
            }
        })
    };
    let window = web_sys::window().ok_or_else(|| TransportError::StartRequest("no window".into()))?;
    let id = window
        .set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            TICK_INTERVAL_MS as i32,
        )
        .map_err(|e| TransportError::StartRequest(format!("{:?}", e)))?;
    d.interval = Some(id);
    d.tick_handler = Some(tick);
    Ok(())
}

fn setup_input_handlers(weak: Weak<RefCell<Driver>>) {
    let Some(window) = web_sys::window() else { return };
    for (event_name, edge) in [("keydown", KeyEdge::Down), ("keyup", KeyEdge::Up)] {
        let weak = weak.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            let Some(driver) = weak.upgrade() else { return };
            let mut d = driver.borrow_mut();
            if d.session.on_key(&event.key(), edge, performance_now()).is_some() {
                event.prevent_default();
                d.flush();
            }
        });
        let _ = window.add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

/// Pause and release held lanes when the page loses focus
fn setup_auto_pause(weak: Weak<RefCell<Driver>>) {
    let Some(window) = web_sys::window() else { return };

    let on_hidden = {
        let weak = weak.clone();
        Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let hidden = web_sys::window()
                .and_then(|w| w.document())
                .map(|doc| doc.visibility_state() == VisibilityState::Hidden)
                .unwrap_or(false);
            if !hidden {
                return;
            }
            let Some(driver) = weak.upgrade() else { return };
            let mut d = driver.borrow_mut();
            d.session.release_keys();
            if d.session.pause(performance_now()) {
                log::info!("Auto-paused (tab hidden)");
            }
            d.flush();
        })
    };
    if let Some(document) = window.document() {
        let _ = document.add_event_listener_with_callback("visibilitychange", on_hidden.as_ref().unchecked_ref());
    }
    on_hidden.forget();

    let on_blur = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
        let Some(driver) = weak.upgrade() else { return };
        let mut d = driver.borrow_mut();
        d.session.release_keys();
        if d.session.pause(performance_now()) {
            log::info!("Auto-paused (window blur)");
        }
        d.flush();
    });
    let _ = window.add_event_listener_with_callback("blur", on_blur.as_ref().unchecked_ref());
    on_blur.forget();
}
