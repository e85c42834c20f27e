//! Panel renderers: thin display models fed from the same snapshot as
//! the scene.
//!
//! Hosts own the actual text widgets; these types compute what to show.

use std::collections::HashMap;

use crate::protocol::{AlertLevel, AlertMessage, ConnectionStatus, CraneState, EventRecord, Snapshot};

/// A consumer of every dispatched snapshot. Must not mutate it.
pub trait PanelRenderer {
    fn render(&mut self, snapshot: &Snapshot);

    fn connection_changed(&mut self, _status: ConnectionStatus) {}
}

// ---------------------------------------------------------------------------
// Status indicator
// ---------------------------------------------------------------------------

/// Binary connected/disconnected indicator. Only channel transitions
/// change it; snapshots never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusIndicator {
    status: ConnectionStatus,
    transitions: u32,
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            transitions: 0,
        }
    }
}

impl StatusIndicator {
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn label(&self) -> &'static str {
        match self.status {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }

    pub fn transitions(&self) -> u32 {
        self.transitions
    }
}

impl PanelRenderer for StatusIndicator {
    fn render(&mut self, _snapshot: &Snapshot) {}

    fn connection_changed(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.transitions += 1;
        }
        self.status = status;
    }
}

// ---------------------------------------------------------------------------
// Alert summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertSummary {
    pub highest: AlertLevel,
    /// Pair counts per level, indexed by `AlertLevel as usize`.
    pub pair_counts: [usize; 4],
    pub crane_count: usize,
    pub active_cranes: usize,
    pub alerts: Vec<AlertMessage>,
}

impl AlertSummary {
    pub fn count(&self, level: AlertLevel) -> usize {
        self.pair_counts[level as usize]
    }

    pub fn headline(&self) -> String {
        format!(
            "{} cranes ({} active), highest {} [C:{} W:{} D:{}]",
            self.crane_count,
            self.active_cranes,
            self.highest,
            self.count(AlertLevel::Caution),
            self.count(AlertLevel::Warning),
            self.count(AlertLevel::Danger),
        )
    }
}

impl PanelRenderer for AlertSummary {
    fn render(&mut self, snapshot: &Snapshot) {
        let mut counts = [0usize; 4];
        for c in &snapshot.collisions {
            counts[c.alert_level as usize] += 1;
        }
        self.highest = snapshot.highest_alert();
        self.pair_counts = counts;
        self.crane_count = snapshot.cranes.len();
        self.active_cranes = snapshot.cranes.iter().filter(|c| c.is_active()).count();
        self.alerts = snapshot.alerts.clone();
    }
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Recent level transitions, newest first.
#[derive(Debug, Clone)]
pub struct EventLogView {
    capacity: usize,
    lines: Vec<String>,
}

impl EventLogView {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// `HH:MM:SS pair FROM→TO (d m)`, UTC clock time.
    pub fn format_event(event: &EventRecord) -> String {
        let secs = event.timestamp.max(0.0) as u64 % 86_400;
        format!(
            "{:02}:{:02}:{:02} {} {}→{} ({:.1}m)",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            event.pair,
            event.from_level,
            event.to_level,
            event.distance,
        )
    }
}

impl PanelRenderer for EventLogView {
    fn render(&mut self, snapshot: &Snapshot) {
        self.lines = snapshot
            .status
            .recent_events
            .iter()
            .rev()
            .take(self.capacity)
            .map(Self::format_event)
            .collect();
    }
}

// ---------------------------------------------------------------------------
// Control panel with focus guard
// ---------------------------------------------------------------------------

/// Holds back external writes to a control while the operator is editing
/// it, and hands the latest held value back on release.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusGuard<T> {
    focused: bool,
    held: Option<T>,
}

impl<T> FocusGuard<T> {
    /// Returns the value to write now, or `None` if it was held back.
    pub fn offer(&mut self, value: T) -> Option<T> {
        if self.focused {
            self.held = Some(value);
            None
        } else {
            Some(value)
        }
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    /// Ends the edit. Returns the last value held back during it.
    pub fn release(&mut self) -> Option<T> {
        self.focused = false;
        self.held.take()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlField {
    SlewAngle,
    SlewSpeed,
    LuffingAngle,
}

impl ControlField {
    pub const ALL: [ControlField; 3] = [
        ControlField::SlewAngle,
        ControlField::SlewSpeed,
        ControlField::LuffingAngle,
    ];

    pub fn read(&self, crane: &CraneState) -> f64 {
        match self {
            ControlField::SlewAngle => crane.slew_angle,
            ControlField::SlewSpeed => crane.slew_speed,
            ControlField::LuffingAngle => crane.luffing_angle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlField::SlewAngle => "slew_angle",
            ControlField::SlewSpeed => "slew_speed",
            ControlField::LuffingAngle => "luffing_angle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "slew_angle" => Some(ControlField::SlewAngle),
            "slew_speed" => Some(ControlField::SlewSpeed),
            "luffing_angle" => Some(ControlField::LuffingAngle),
            _ => None,
        }
    }
}

/// Pushes per-crane control values to slider widgets through `sink`,
/// except for sliders the operator is currently dragging.
pub struct ControlPanel<F>
where
    F: FnMut(&str, ControlField, f64),
{
    guards: HashMap<(String, ControlField), FocusGuard<f64>>,
    sink: F,
}

impl<F> ControlPanel<F>
where
    F: FnMut(&str, ControlField, f64),
{
    pub fn new(sink: F) -> Self {
        Self {
            guards: HashMap::new(),
            sink,
        }
    }

    pub fn begin_edit(&mut self, crane_id: &str, field: ControlField) {
        self.guards
            .entry((crane_id.to_owned(), field))
            .or_default()
            .focus();
    }

    /// Ends the edit and re-applies the newest value held back meanwhile.
    pub fn end_edit(&mut self, crane_id: &str, field: ControlField) {
        let held = self
            .guards
            .get_mut(&(crane_id.to_owned(), field))
            .and_then(FocusGuard::release);
        if let Some(value) = held {
            (self.sink)(crane_id, field, value);
        }
    }

    pub fn is_editing(&self, crane_id: &str, field: ControlField) -> bool {
        self.guards
            .get(&(crane_id.to_owned(), field))
            .is_some_and(FocusGuard::is_focused)
    }
}

impl<F> PanelRenderer for ControlPanel<F>
where
    F: FnMut(&str, ControlField, f64),
{
    fn render(&mut self, snapshot: &Snapshot) {
        // Forget guards of departed cranes unless an edit is still open.
        self.guards
            .retain(|(id, _), guard| guard.is_focused() || snapshot.crane(id).is_some());
        for crane in &snapshot.cranes {
            for field in ControlField::ALL {
                let value = field.read(crane);
                let write = match self.guards.get_mut(&(crane.id.clone(), field)) {
                    Some(guard) => guard.offer(value),
                    None => Some(value),
                };
                if let Some(value) = write {
                    (self.sink)(&crane.id, field, value);
                }
            }
        }
    }
}
