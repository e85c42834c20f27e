//! crane-console binary
//!
//! Connects to the simulation server, keeps a headless scene in sync with
//! the snapshot stream and reports what an operator would see in the log.
//! Commands are read from stdin, one per line:
//!
//! ```text
//! control TC-1 slew_angle=45 slew_speed=0.5
//! scenario approaching
//! speed 2
//! stop
//! ```
//!
//! ## Configuration (env / TOML via `config` crate, flags override)
//!
//! | Key                                 | Default                  |
//! |-------------------------------------|--------------------------|
//! | `CRANE_CONSOLE_ENDPOINT`            | `ws://localhost:8000/ws` |
//! | `CRANE_CONSOLE_API_BASE`            | `http://localhost:8000`  |
//! | `CRANE_CONSOLE_RECONNECT__DELAY_MS` | `3000`                   |
//! | `CRANE_CONSOLE_EVENT_LOG_LEN`       | `20`                     |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crane_console::{
    dispatch::SnapshotDispatcher,
    headless::HeadlessScene,
    panels::{AlertSummary, EventLogView, PanelRenderer, StatusIndicator},
    protocol::{Command, ConnectionStatus, ControlValues, Snapshot},
    runtime::{self, Runtime},
    settings,
    types::ConsoleConfig,
    AlertLevel,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "crane-console", about = "Crane collision-warning operator console", version)]
struct Args {
    /// Optional TOML config file
    #[arg(long, env = "CRANE_CONSOLE_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket endpoint of the simulation server
    #[arg(long)]
    endpoint: Option<String>,

    /// Base URL of the HTTP API
    #[arg(long)]
    api_base: Option<String>,

    /// Reconnect delay in milliseconds
    #[arg(long)]
    reconnect_ms: Option<u64>,

    /// Seconds between summary lines
    #[arg(long, env = "CRANE_CONSOLE_SUMMARY_SECS", default_value_t = 5)]
    summary_secs: u64,

    /// Do not fetch the scenario list at startup
    #[arg(long)]
    skip_scenarios: bool,
}

impl Args {
    fn apply(&self, config: &mut ConsoleConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(ms) = self.reconnect_ms {
            config.reconnect.delay_ms = ms;
            config.reconnect.max_delay_ms = config.reconnect.max_delay_ms.max(ms);
        }
    }
}

// ---------------------------------------------------------------------------
// Log panel
// ---------------------------------------------------------------------------

/// Renders the panel models into log lines, only when something changed.
struct LogPanel {
    status: StatusIndicator,
    summary: AlertSummary,
    events: EventLogView,
    last_highest: AlertLevel,
    last_event: Option<String>,
}

impl LogPanel {
    fn new(event_log_len: usize) -> Self {
        Self {
            status: StatusIndicator::default(),
            summary: AlertSummary::default(),
            events: EventLogView::new(event_log_len),
            last_highest: AlertLevel::Normal,
            last_event: None,
        }
    }
}

impl PanelRenderer for LogPanel {
    fn render(&mut self, snapshot: &Snapshot) {
        self.summary.render(snapshot);
        self.events.render(snapshot);

        if self.summary.highest != self.last_highest {
            if self.summary.highest.is_elevated() {
                log::warn!("[panel] {}", self.summary.headline());
            } else {
                log::info!("[panel] {}", self.summary.headline());
            }
            for alert in &self.summary.alerts {
                log::warn!("[panel] {}: {}", alert.alert_level, alert.message);
            }
            self.last_highest = self.summary.highest;
        }

        // Print events newer than the last one shown, oldest first.
        let lines = self.events.lines();
        let fresh = match &self.last_event {
            Some(last) => lines.iter().position(|l| l == last).unwrap_or(lines.len()),
            None => lines.len(),
        };
        for line in lines[..fresh].iter().rev() {
            log::info!("[event] {line}");
        }
        if let Some(newest) = lines.first() {
            self.last_event = Some(newest.clone());
        }
    }

    fn connection_changed(&mut self, status: ConnectionStatus) {
        self.status.connection_changed(status);
        log::info!("[panel] Status: {}", self.status.label());
    }
}

// ---------------------------------------------------------------------------
// Stdin commands
// ---------------------------------------------------------------------------

fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let command = match verb {
        "stop" | "stop_all" => Command::stop_all(),
        "scenario" => {
            let id = words.next().context("usage: scenario <id>")?;
            Command::scenario(id)?
        }
        "speed" => {
            let raw = words.next().context("usage: speed <multiplier>")?;
            let speed: f64 = raw.parse().with_context(|| format!("not a number: {raw}"))?;
            Command::sim_speed(speed)?
        }
        "control" => {
            let crane_id = words.next().context("usage: control <crane> key=value ...")?;
            let mut values = ControlValues::default();
            for pair in words.by_ref() {
                let (key, raw) = pair
                    .split_once('=')
                    .with_context(|| format!("expected key=value, got {pair}"))?;
                let v: f64 = raw.parse().with_context(|| format!("not a number: {raw}"))?;
                values = match key {
                    "slew_angle" => values.slew_angle(v),
                    "slew_speed" => values.slew_speed(v),
                    "luffing_angle" => values.luffing_angle(v),
                    "luffing_speed" => values.luffing_speed(v),
                    other => bail!("unknown control field: {other}"),
                };
            }
            Command::control(crane_id, values)?
        }
        other => bail!("unknown command: {other}"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected argument: {extra}");
    }
    Ok(command)
}

async fn read_commands(tx: mpsc::UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match parse_command(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("[stdin] {e:#}"),
            },
            Ok(None) => break,
            Err(e) => {
                log::warn!("[stdin] Read failed: {e}");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crane_console=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = settings::load(args.config.as_deref())?;
    args.apply(&mut config);
    settings::validate(&config)?;

    log::info!(
        "Starting crane-console (endpoint='{}', api='{}', reconnect={}ms)",
        config.endpoint,
        config.api_base,
        config.reconnect.delay_ms,
    );

    if !args.skip_scenarios {
        let api_base = config.api_base.clone();
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            match runtime::fetch_scenarios(&client, &api_base).await {
                Ok(list) => {
                    log::info!("{} scenarios available", list.scenarios.len());
                    for s in &list.scenarios {
                        log::info!("  {:<20} {}", s.id, s.name);
                    }
                }
                Err(e) => log::warn!("Scenario list unavailable: {e:#}"),
            }
        });
    }

    let dispatcher =
        SnapshotDispatcher::new(HeadlessScene::new()).with_panel(LogPanel::new(config.event_log_len));
    let runtime = Runtime::new(&config, dispatcher);
    let summary = runtime::spawn_summary(runtime.stats(), Duration::from_secs(args.summary_secs.max(1)));

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(cmd_tx));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Could not listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };
    let console = runtime.run(cmd_rx, shutdown).await;
    summary.abort();

    log::info!(
        "crane-console stopped ({} snapshots dispatched)",
        console.dispatcher().dispatched()
    );
    Ok(())
}
