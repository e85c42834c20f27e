//! `CraneConsoleClient`: the primary wasm-bindgen export.
//!
//! ## JavaScript usage
//!
//! ```js
//! import init, { CraneConsoleClient } from './pkg/crane_console_wasm.js';
//!
//! await init();
//!
//! const console3d = new CraneConsoleClient('ws://localhost:8000/ws', threeAdapter);
//!
//! console3d.onConnectionState((state) => { badge.textContent = state; });
//! console3d.onSnapshot((view) => { renderPanels(view); });
//! console3d.onControlValue((craneId, field, value) => { slider(craneId, field).value = value; });
//!
//! console3d.connect();
//! const scenarios = await console3d.fetchScenarios();
//!
//! // In your render loop:
//! function tick() {
//!   console3d.poll();
//!   renderer.render(scene, camera);
//!   requestAnimationFrame(tick);
//! }
//! tick();
//!
//! slider.addEventListener('pointerdown', () => console3d.beginEdit('TC-1', 'slew_angle'));
//! slider.addEventListener('change', (e) => {
//!   console3d.sendControl('TC-1', +e.target.value);
//!   console3d.endEdit('TC-1', 'slew_angle');
//! });
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crane_console::panels::{
    AlertSummary, ControlField, ControlPanel, EventLogView, PanelRenderer, StatusIndicator,
};
use crane_console::protocol::{
    api_base_from_endpoint, join_url, paths, Command, ConnectionStatus, ControlValues, ScenarioList,
    Snapshot,
};
use crane_console::{Channel, Console, ReconnectPolicy, SnapshotDispatcher};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use crate::bridge::{js_error, BrowserConnector, BrowserTimer, EventQueue};
use crate::events::ClientEvent;
use crate::three::JsRenderEngine;
use crate::view::snapshot_view;

type BrowserConsole = Console<BrowserConnector, BrowserTimer, JsRenderEngine>;
type Callback = Rc<RefCell<Option<js_sys::Function>>>;
type SliderSink = Box<dyn FnMut(&str, ControlField, f64)>;

const EVENT_LOG_LEN: usize = 20;
/// Upper bound of queued events handled per `poll()`.
const POLL_BUDGET: usize = 256;

// ---------------------------------------------------------------------------
// Panels wired to JS callbacks
// ---------------------------------------------------------------------------

struct JsPanels {
    status: StatusIndicator,
    summary: AlertSummary,
    events: EventLogView,
    on_state: Callback,
    on_snapshot: Callback,
}

impl PanelRenderer for JsPanels {
    fn render(&mut self, snapshot: &Snapshot) {
        self.summary.render(snapshot);
        self.events.render(snapshot);
        if self.on_snapshot.borrow().is_some() {
            let view = snapshot_view(&self.summary, &self.events, snapshot);
            call_fn(&self.on_snapshot, &[to_js(&view)]);
        }
    }

    fn connection_changed(&mut self, status: ConnectionStatus) {
        self.status.connection_changed(status);
        call_fn(&self.on_state, &[JsValue::from_str(status.as_str())]);
    }
}

/// Lets the client reach the control panel after handing it to the
/// dispatcher.
#[derive(Clone)]
struct SharedControls(Rc<RefCell<ControlPanel<SliderSink>>>);

impl PanelRenderer for SharedControls {
    fn render(&mut self, snapshot: &Snapshot) {
        self.0.borrow_mut().render(snapshot);
    }
}

// ---------------------------------------------------------------------------
// CraneConsoleClient
// ---------------------------------------------------------------------------

/// Primary Wasm API object.
///
/// Instantiate with `new CraneConsoleClient(endpoint, adapter)`.
/// Call `connect()` once, then `poll()` each animation frame.
#[wasm_bindgen]
pub struct CraneConsoleClient {
    console: BrowserConsole,
    queue: EventQueue,
    api_base: String,
    controls: SharedControls,

    // JS callback storage
    on_connection_state: Callback,
    on_snapshot: Callback,
    on_control_value: Callback,
}

#[wasm_bindgen]
impl CraneConsoleClient {
    // -----------------------------------------------------------------------
    // Constructor
    // -----------------------------------------------------------------------

    /// Create a new client.
    ///
    /// @param endpoint - WebSocket URL of the simulation server (e.g. `ws://localhost:8000/ws`)
    /// @param adapter  - render adapter object (see `three.rs`)
    #[wasm_bindgen(constructor)]
    pub fn new(endpoint: &str, adapter: JsValue) -> Self {
        let queue: EventQueue = Rc::new(RefCell::new(VecDeque::new()));
        let on_connection_state: Callback = Rc::default();
        let on_snapshot: Callback = Rc::default();
        let on_control_value: Callback = Rc::default();

        let sink: SliderSink = {
            let cb = on_control_value.clone();
            Box::new(move |crane_id: &str, field: ControlField, value: f64| {
                call_fn(
                    &cb,
                    &[
                        JsValue::from_str(crane_id),
                        JsValue::from_str(field.as_str()),
                        JsValue::from(value),
                    ],
                );
            })
        };
        let controls = SharedControls(Rc::new(RefCell::new(ControlPanel::new(sink))));

        let dispatcher = SnapshotDispatcher::new(JsRenderEngine::new(adapter))
            .with_panel(JsPanels {
                status: StatusIndicator::default(),
                summary: AlertSummary::default(),
                events: EventLogView::new(EVENT_LOG_LEN),
                on_state: on_connection_state.clone(),
                on_snapshot: on_snapshot.clone(),
            })
            .with_panel(controls.clone());

        let channel = Channel::new(
            endpoint,
            ReconnectPolicy::default(),
            BrowserConnector::new(queue.clone()),
            BrowserTimer::new(queue.clone()),
        );

        Self {
            console: Console::new(channel, dispatcher),
            queue,
            api_base: api_base_from_endpoint(endpoint),
            controls,
            on_connection_state,
            on_snapshot,
            on_control_value,
        }
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Open the WebSocket. Reconnects happen on their own afterwards.
    #[wasm_bindgen]
    pub fn connect(&mut self) {
        self.console.connect();
    }

    /// Close the WebSocket, stop reconnecting and clear the scene.
    #[wasm_bindgen]
    pub fn disconnect(&mut self) {
        self.console.shutdown();
        self.queue.borrow_mut().clear();
    }

    /// Override the HTTP base used by `fetchScenarios`.
    #[wasm_bindgen(js_name = setApiBase)]
    pub fn set_api_base(&mut self, api_base: &str) {
        self.api_base = api_base.to_owned();
    }

    // -----------------------------------------------------------------------
    // poll(): must be called each animation frame
    // -----------------------------------------------------------------------

    /// Apply queued link and timer events in arrival order.
    ///
    /// Returns the number of events handled.
    #[wasm_bindgen]
    pub fn poll(&mut self) -> u32 {
        let mut handled = 0;
        while handled < POLL_BUDGET {
            // Release the queue before applying: handlers may enqueue.
            let Some(event) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            handled += 1;
            let current = self.console.channel().connector().generation();
            if event.is_stale(current) {
                log::debug!("[client] Dropping stale {:?}", event);
                continue;
            }
            match event {
                ClientEvent::Link { event, .. } => {
                    self.console.apply(event);
                }
                ClientEvent::ReconnectDue => self.console.reconnect_due(),
            }
        }
        handled as u32
    }

    // -----------------------------------------------------------------------
    // Callback registration
    // -----------------------------------------------------------------------

    /// `callback(state: string)`: `"connected"` | `"disconnected"`
    #[wasm_bindgen(js_name = onConnectionState)]
    pub fn on_connection_state(&mut self, cb: js_sys::Function) {
        *self.on_connection_state.borrow_mut() = Some(cb);
    }

    /// `callback(view: object)`: see `view.rs` for the shape
    #[wasm_bindgen(js_name = onSnapshot)]
    pub fn on_snapshot(&mut self, cb: js_sys::Function) {
        *self.on_snapshot.borrow_mut() = Some(cb);
    }

    /// `callback(craneId: string, field: string, value: number)`
    #[wasm_bindgen(js_name = onControlValue)]
    pub fn on_control_value(&mut self, cb: js_sys::Function) {
        *self.on_control_value.borrow_mut() = Some(cb);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Returns false when disconnected or when no value is given.
    #[wasm_bindgen(js_name = sendControl)]
    pub fn send_control(
        &mut self,
        crane_id: &str,
        slew_angle: Option<f64>,
        slew_speed: Option<f64>,
        luffing_angle: Option<f64>,
        luffing_speed: Option<f64>,
    ) -> bool {
        let values = ControlValues {
            slew_angle,
            slew_speed,
            luffing_angle,
            luffing_speed,
        };
        self.send_checked(Command::control(crane_id, values))
    }

    #[wasm_bindgen(js_name = applyScenario)]
    pub fn apply_scenario(&mut self, scenario_id: &str) -> bool {
        self.send_checked(Command::scenario(scenario_id))
    }

    #[wasm_bindgen(js_name = stopAll)]
    pub fn stop_all(&mut self) -> bool {
        self.console.send(&Command::stop_all())
    }

    #[wasm_bindgen(js_name = setSimSpeed)]
    pub fn set_sim_speed(&mut self, speed: f64) -> bool {
        self.send_checked(Command::sim_speed(speed))
    }

    // -----------------------------------------------------------------------
    // Slider focus
    // -----------------------------------------------------------------------

    /// Hold back snapshot writes to this slider until `endEdit`.
    #[wasm_bindgen(js_name = beginEdit)]
    pub fn begin_edit(&mut self, crane_id: &str, field: &str) {
        match ControlField::parse(field) {
            Some(field) => self.controls.0.borrow_mut().begin_edit(crane_id, field),
            None => log::warn!("[client] Unknown control field '{}'", field),
        }
    }

    /// Release the slider; the newest held value is pushed immediately.
    #[wasm_bindgen(js_name = endEdit)]
    pub fn end_edit(&mut self, crane_id: &str, field: &str) {
        match ControlField::parse(field) {
            Some(field) => self.controls.0.borrow_mut().end_edit(crane_id, field),
            None => log::warn!("[client] Unknown control field '{}'", field),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario list
    // -----------------------------------------------------------------------

    /// Resolves to `[{ id, name, description }]`.
    #[wasm_bindgen(js_name = fetchScenarios)]
    pub fn fetch_scenarios(&self) -> js_sys::Promise {
        let url = join_url(&self.api_base, paths::SCENARIOS);
        future_to_promise(async move {
            let list = fetch_scenario_list(&url).await.map_err(|e| {
                log::warn!("[client] Scenario list unavailable: {}", js_error(&e));
                e
            })?;
            Ok(to_js(&list.scenarios))
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[wasm_bindgen(js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.console.channel().is_open()
    }

    #[wasm_bindgen(js_name = reconnectAttempts)]
    pub fn reconnect_attempts(&self) -> u32 {
        self.console.channel().attempts()
    }

    /// Number of live crane visuals.
    #[wasm_bindgen(js_name = liveCount)]
    pub fn live_count(&self) -> u32 {
        self.console.dispatcher().scene().len() as u32
    }

    #[wasm_bindgen(js_name = hasCrane)]
    pub fn has_crane(&self, crane_id: &str) -> bool {
        self.console.dispatcher().scene().contains(crane_id)
    }

    /// Last snapshot as a plain object, or `null` before the first one.
    #[wasm_bindgen(js_name = latestSnapshot)]
    pub fn latest_snapshot(&self) -> JsValue {
        self.console
            .dispatcher()
            .latest()
            .map(to_js)
            .unwrap_or(JsValue::NULL)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

impl CraneConsoleClient {
    fn send_checked(&mut self, command: Result<Command, crane_console::CommandError>) -> bool {
        match command {
            Ok(command) => self.console.send(&command),
            Err(e) => {
                log::warn!("[client] Rejected command: {}", e);
                false
            }
        }
    }
}

async fn fetch_scenario_list(url: &str) -> Result<ScenarioList, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
        .await?
        .dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!(
            "scenario request failed ({})",
            response.status()
        )));
    }
    let body = JsFuture::from(response.text()?).await?;
    let text = body.as_string().unwrap_or_default();
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Serialise through JSON so the page gets a plain object.
fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|s| js_sys::JSON::parse(&s).ok())
        .unwrap_or(JsValue::NULL)
}

// ---------------------------------------------------------------------------
// JS callback helper
// ---------------------------------------------------------------------------

fn call_fn(f: &Callback, args: &[JsValue]) {
    // Clone out so a callback that re-registers does not hit a live borrow.
    let func = f.borrow().clone();
    if let Some(func) = func {
        let this = JsValue::NULL;
        let arr = js_sys::Array::new();
        for a in args {
            arr.push(a);
        }
        if let Err(e) = func.apply(&this, &arr) {
            log::warn!("[client] Callback error: {:?}", e);
        }
    }
}
