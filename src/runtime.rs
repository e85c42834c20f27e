//! Native host: drives a [`Console`] with tokio-tungstenite.
//!
//! ```text
//!  link task #g ──(g, LinkEvent)──┐
//!  link task #g+1 ────────────────┤ unbounded mpsc
//!                                 ▼
//!  stdin commands ──────────▶  Runtime::run  (one task, owns the Console)
//!  reconnect deadline ──────▶      │
//!  ctrl-c ──────────────────▶      ▼
//!                          Arc<Mutex<FrameStats>> ◀── summary ticker (read-only)
//! ```
//!
//! Every connection attempt gets a generation number. Link tasks tag their
//! events with it, and events from a superseded attempt are dropped before
//! they reach the console.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::channel::{Channel, Connector, ReconnectTimer, Socket};
use crate::console::{Console, LinkEvent};
use crate::dispatch::SnapshotDispatcher;
use crate::error::ChannelError;
use crate::headless::HeadlessScene;
use crate::protocol::{join_url, paths, AlertLevel, Command, ScenarioList};
use crate::types::ConsoleConfig;

pub type NativeConsole = Console<WsConnector, TokioTimer, HeadlessScene>;

type TaggedEvent = (u64, LinkEvent);

// ---------------------------------------------------------------------------
// Connector / socket
// ---------------------------------------------------------------------------

enum Outbound {
    Text(String),
    Close,
}

/// Spawns one link task per connection attempt.
pub struct WsConnector {
    events: mpsc::UnboundedSender<TaggedEvent>,
    generation: u64,
}

impl WsConnector {
    pub fn new(events: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self {
            events,
            generation: 0,
        }
    }

    /// Generation of the most recent attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Connector for WsConnector {
    type Socket = WsSocket;

    fn open(&mut self, url: &str) -> Result<WsSocket, ChannelError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| ChannelError::open(url, e))?;
        self.generation += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(link_task(
            url.to_owned(),
            self.generation,
            rx,
            self.events.clone(),
        ));
        Ok(WsSocket { outbound: tx })
    }
}

/// Write half handed to the channel. Dropping it ends the link task.
pub struct WsSocket {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Socket for WsSocket {
    fn send_text(&mut self, text: &str) -> Result<(), ChannelError> {
        self.outbound
            .send(Outbound::Text(text.to_owned()))
            .map_err(|_| ChannelError::SocketClosed)
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

async fn link_task(
    url: String,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TaggedEvent>,
) {
    let emit = |event: LinkEvent| {
        let _ = events.send((generation, event));
    };

    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            emit(LinkEvent::Error(e.to_string()));
            return;
        }
    };
    emit(LinkEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => emit(LinkEvent::Frame(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                    emit(LinkEvent::Closed(reason));
                    break;
                }
                // Pings are answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    emit(LinkEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    emit(LinkEvent::Closed("stream ended".into()));
                    break;
                }
            },
            out = outbound.recv() => match out {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        emit(LinkEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }
    log::debug!("[runtime] Link task #{generation} finished");
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Deadline polled by the run loop.
#[derive(Debug, Default)]
pub struct TokioTimer {
    deadline: Option<Instant>,
}

impl TokioTimer {
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl ReconnectTimer for TokioTimer {
    fn schedule(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Shared stats
// ---------------------------------------------------------------------------

/// Read-only view for the summary ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub frames: u64,
    pub snapshots: u64,
    pub stale_events: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub live_cranes: usize,
    pub overlay_lines: usize,
    pub highest_alert: AlertLevel,
    pub tick_count: Option<u64>,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

pub struct Runtime {
    console: NativeConsole,
    events: mpsc::UnboundedReceiver<TaggedEvent>,
    counters: FrameStats,
    stats: Arc<Mutex<FrameStats>>,
}

impl Runtime {
    pub fn new(config: &ConsoleConfig, dispatcher: SnapshotDispatcher<HeadlessScene>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Channel::new(
            config.endpoint.clone(),
            config.reconnect.clone(),
            WsConnector::new(tx),
            TokioTimer::default(),
        );
        Self {
            console: Console::new(channel, dispatcher),
            events: rx,
            counters: FrameStats::default(),
            stats: Arc::new(Mutex::new(FrameStats::default())),
        }
    }

    pub fn stats(&self) -> Arc<Mutex<FrameStats>> {
        self.stats.clone()
    }

    pub fn console(&self) -> &NativeConsole {
        &self.console
    }

    /// Connect and process events until `shutdown` resolves. Hands the
    /// console back so the caller can inspect the final state.
    pub async fn run<F>(mut self, mut commands: mpsc::UnboundedReceiver<Command>, shutdown: F) -> NativeConsole
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut commands_open = true;

        self.console.connect();
        self.publish();

        loop {
            let deadline = self.console.channel().timer().deadline();
            tokio::select! {
                Some((generation, event)) = self.events.recv() => self.on_link(generation, event),
                _ = wait_until(deadline) => self.console.reconnect_due(),
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => self.on_command(&cmd),
                    None => {
                        log::debug!("[runtime] Command input closed");
                        commands_open = false;
                    }
                },
                _ = &mut shutdown => {
                    log::info!("[runtime] Shutting down");
                    self.console.shutdown();
                    self.publish();
                    break;
                }
            }
            self.publish();
        }

        self.console
    }

    fn on_link(&mut self, generation: u64, event: LinkEvent) {
        let current = self.console.channel().connector().generation();
        if generation != current {
            self.counters.stale_events += 1;
            log::debug!("[runtime] Dropping event from superseded link #{generation} (current #{current})");
            return;
        }
        if matches!(event, LinkEvent::Frame(_)) {
            self.counters.frames += 1;
        }
        if let Some(stats) = self.console.apply(event) {
            self.counters.snapshots += 1;
            self.counters.overlay_lines = stats.overlay_lines;
        }
    }

    fn on_command(&mut self, command: &Command) {
        if self.console.send(command) {
            self.counters.commands_sent += 1;
        } else {
            self.counters.commands_dropped += 1;
        }
    }

    fn publish(&mut self) {
        let dispatcher = self.console.dispatcher();
        let latest = dispatcher.latest();
        self.counters.connected = self.console.channel().is_open();
        self.counters.reconnect_attempts = self.console.channel().attempts();
        self.counters.live_cranes = dispatcher.scene().len();
        self.counters.highest_alert = latest.map(|s| s.highest_alert()).unwrap_or_default();
        self.counters.tick_count = latest.and_then(|s| s.simulation.as_ref()).map(|sim| sim.tick_count);
        *self.stats.lock() = self.counters.clone();
    }
}

/// Log a one-line summary every `period`, independent of frame arrival.
pub fn spawn_summary(stats: Arc<Mutex<FrameStats>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        let mut last = FrameStats::default();
        loop {
            timer.tick().await;
            // Copy out so the lock is not held while logging.
            let now = stats.lock().clone();
            if now == last {
                continue;
            }
            tracing::info!(
                connected = now.connected,
                cranes = now.live_cranes,
                overlay = now.overlay_lines,
                highest = %now.highest_alert,
                snapshots = now.snapshots,
                attempts = now.reconnect_attempts,
                "console summary"
            );
            last = now;
        }
    })
}

// ---------------------------------------------------------------------------
// Scenario list
// ---------------------------------------------------------------------------

/// One GET of the scenario catalogue. Callers treat failure as non-fatal.
pub async fn fetch_scenarios(client: &reqwest::Client, api_base: &str) -> anyhow::Result<ScenarioList> {
    let url = join_url(api_base, paths::SCENARIOS);
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("scenario catalogue unreachable at {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("scenario catalogue body from {url} unreadable"))?;
    decode_scenarios(status, &body)
}

/// Longest server error body quoted back in a failure.
const ERROR_BODY_LIMIT: usize = 200;

fn decode_scenarios(status: reqwest::StatusCode, body: &str) -> anyhow::Result<ScenarioList> {
    if !status.is_success() {
        let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        bail!("scenario catalogue answered {status}: {excerpt}");
    }
    serde_json::from_str(body).context("scenario catalogue is not a scenario list")
}
