//! Wire protocol between the simulation server and the console.
//!
//! This module owns **every message that crosses the socket boundary**.
//!
//! ## Frames
//!
//! | Direction        | Shape                                   | Type            |
//! |------------------|-----------------------------------------|-----------------|
//! | server → console | `{ status, cranes, collisions, alerts }` | [`Snapshot`]    |
//! | server → console | `{ error: "..." }`                       | server error    |
//! | server → console | `{ ack: true, type?: "..." }`            | [`Ack`]         |
//! | console → server | `{ type: "control" \| "scenario" \| ... }` | [`Command`]   |
//! | HTTP GET         | `{ scenarios: [...] }`                   | [`ScenarioList`] |
//!
//! ## Design rules
//!
//! 1. Every snapshot is authoritative and complete; nothing here diffs.
//! 2. Absent, `null` or mistyped fields read as safe defaults; a list entry
//!    that does not parse is dropped on its own. Only a non-JSON or
//!    non-object frame is malformed.
//! 3. Alert levels are totally ordered; unknown spellings read as `NORMAL`.
//! 4. `time_to_collision` keeps its three-way meaning, see [`TimeToCollision`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{CommandError, FrameError};

// ---------------------------------------------------------------------------
// Alert level
// ---------------------------------------------------------------------------

/// Severity classification for a crane or a crane pair.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    #[default]
    Normal,
    Caution,
    Warning,
    Danger,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "NORMAL",
            AlertLevel::Caution => "CAUTION",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Danger => "DANGER",
        }
    }

    /// Lenient parse: unknown spellings fall back to `Normal`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "CAUTION" => AlertLevel::Caution,
            "WARNING" => AlertLevel::Warning,
            "DANGER" => AlertLevel::Danger,
            _ => AlertLevel::Normal,
        }
    }

    pub fn is_elevated(&self) -> bool {
        *self > AlertLevel::Normal
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AlertLevel {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(d)?;
        Ok(raw.as_str().map(AlertLevel::parse).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Lenient field helpers
// ---------------------------------------------------------------------------

/// Absent, `null` and mistyped values all become `T::default()`.
fn lenient<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = serde_json::Value::deserialize(d)?;
    if raw.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(raw).unwrap_or_else(|e| {
        log::debug!("[protocol] Malformed field read as default: {e}");
        T::default()
    }))
}

/// Like [`lenient`], but per entry: one bad entry is dropped, the rest of
/// the list survives.
fn lenient_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match serde_json::Value::deserialize(d)? {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => {
            log::debug!("[protocol] Expected a list, got {other}");
            return Ok(Vec::new());
        }
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("[protocol] Skipping malformed entry: {e}");
                None
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Cranes
// ---------------------------------------------------------------------------

/// A point in the simulation's domain frame (x east, y north, z up).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainPoint {
    #[serde(default, deserialize_with = "lenient")]
    pub x: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub y: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub z: f64,
}

/// One crane as reported by the server. Angles are degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CraneState {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub base_x: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub base_y: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub mast_height: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub boom_length: f64,
    /// Clockwise from north.
    #[serde(default, deserialize_with = "lenient")]
    pub slew_angle: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub slew_speed: f64,
    /// Above horizontal.
    #[serde(default, deserialize_with = "lenient")]
    pub luffing_angle: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub luffing_speed: f64,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub working_radius: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_working_radius: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub boom_tip: Option<DomainPoint>,
}

impl CraneState {
    /// Horizontal reach of the boom. Uses the server value when present.
    pub fn working_radius(&self) -> f64 {
        self.working_radius
            .unwrap_or_else(|| self.boom_length * self.luffing_angle.to_radians().cos())
    }

    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

// ---------------------------------------------------------------------------
// Collisions
// ---------------------------------------------------------------------------

/// Three-way reading of `time_to_collision`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeToCollision {
    /// Field absent: the pair is not converging.
    NotConverging,
    /// Zero (or below): already at the collision distance.
    Imminent,
    /// Seconds until the predicted collision.
    In(f64),
}

impl std::fmt::Display for TimeToCollision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeToCollision::NotConverging => f.write_str("-"),
            TimeToCollision::Imminent => f.write_str("now"),
            TimeToCollision::In(s) => write!(f, "{:.1}s", s),
        }
    }
}

/// Pairwise check result. The pair is unordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub crane_a_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub crane_b_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub current_distance: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub boom_tip_distance: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub time_to_collision: Option<f64>,
    #[serde(default)]
    pub alert_level: AlertLevel,
    #[serde(default, deserialize_with = "lenient")]
    pub overlap_exists: bool,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_predicted_distance: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_predicted_time: Option<f64>,
}

impl CollisionRecord {
    pub fn ttc(&self) -> TimeToCollision {
        match self.time_to_collision {
            None => TimeToCollision::NotConverging,
            Some(t) if t <= 0.0 => TimeToCollision::Imminent,
            Some(t) => TimeToCollision::In(t),
        }
    }

    /// Order-independent key for the pair.
    pub fn pair_key(&self) -> (&str, &str) {
        if self.crane_a_id <= self.crane_b_id {
            (&self.crane_a_id, &self.crane_b_id)
        } else {
            (&self.crane_b_id, &self.crane_a_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts, events, status
// ---------------------------------------------------------------------------

/// Current (not cumulative) operator alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    #[serde(default)]
    pub alert_level: AlertLevel,
    #[serde(default, deserialize_with = "lenient")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub crane_a_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub crane_b_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub voice_text: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub time_to_collision: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// A level transition recorded by the server for one pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unix seconds.
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub pair: String,
    #[serde(default)]
    pub from_level: AlertLevel,
    #[serde(default)]
    pub to_level: AlertLevel,
    #[serde(default, deserialize_with = "lenient")]
    pub distance: f64,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub crane_a_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub crane_b_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBlock {
    #[serde(default, deserialize_with = "lenient")]
    pub crane_alerts: HashMap<String, AlertLevel>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recent_events: Vec<EventRecord>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_cranes: Option<usize>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub active_cranes: Option<usize>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_pairs: Option<usize>,
    #[serde(default, deserialize_with = "lenient")]
    pub status_counts: BTreeMap<String, usize>,
    #[serde(default)]
    pub highest_alert: AlertLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub is_running: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub tick_count: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub speed_multiplier: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub active_scenario: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Complete world state for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient")]
    pub status: StatusBlock,
    #[serde(default, deserialize_with = "lenient_list")]
    pub cranes: Vec<CraneState>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub collisions: Vec<CollisionRecord>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub alerts: Vec<AlertMessage>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationInfo>,
}

impl Snapshot {
    pub fn crane(&self, id: &str) -> Option<&CraneState> {
        self.cranes.iter().find(|c| c.id == id)
    }

    /// Current level of one crane; `Normal` when unreported.
    pub fn alert_level_of(&self, crane_id: &str) -> AlertLevel {
        self.status
            .crane_alerts
            .get(crane_id)
            .copied()
            .unwrap_or_default()
    }

    /// Highest level across the status block and all collision records.
    pub fn highest_alert(&self) -> AlertLevel {
        self.collisions
            .iter()
            .map(|c| c.alert_level)
            .fold(self.status.highest_alert, AlertLevel::max)
    }
}

// ---------------------------------------------------------------------------
// Inbound frame classification
// ---------------------------------------------------------------------------

/// Server acknowledgement of a command. Not correlated with any request.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Snapshot(Box<Snapshot>),
    ServerError(String),
    Ack(Ack),
}

/// Classify one raw text frame.
///
/// Priority: unparseable → `Err`; `error` field → `ServerError`; `ack`
/// field → `Ack`; anything else is a snapshot.
pub fn classify_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let obj = value.as_object().ok_or(FrameError::NotAnObject)?;

    if let Some(err) = obj.get("error").filter(|v| !v.is_null()) {
        let message = err
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        return Ok(InboundFrame::ServerError(message));
    }

    if obj.get("ack").is_some_and(|v| !v.is_null()) {
        let kind = obj.get("type").and_then(|t| t.as_str()).map(str::to_owned);
        return Ok(InboundFrame::Ack(Ack { kind }));
    }

    let snapshot: Snapshot = serde_json::from_value(value)?;
    Ok(InboundFrame::Snapshot(Box::new(snapshot)))
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// Values for a `control` command. At least one must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slew_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slew_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub luffing_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub luffing_speed: Option<f64>,
}

impl ControlValues {
    pub fn is_empty(&self) -> bool {
        self.slew_angle.is_none()
            && self.slew_speed.is_none()
            && self.luffing_angle.is_none()
            && self.luffing_speed.is_none()
    }

    pub fn slew_angle(mut self, v: f64) -> Self {
        self.slew_angle = Some(v);
        self
    }

    pub fn slew_speed(mut self, v: f64) -> Self {
        self.slew_speed = Some(v);
        self
    }

    pub fn luffing_angle(mut self, v: f64) -> Self {
        self.luffing_angle = Some(v);
        self
    }

    pub fn luffing_speed(mut self, v: f64) -> Self {
        self.luffing_speed = Some(v);
        self
    }

    fn check_finite(&self) -> Result<(), CommandError> {
        let fields = [
            ("slew_angle", self.slew_angle),
            ("slew_speed", self.slew_speed),
            ("luffing_angle", self.luffing_angle),
            ("luffing_speed", self.luffing_speed),
        ];
        for (field, value) in fields {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(CommandError::NonFinite { field, value });
            }
        }
        Ok(())
    }
}

/// Operator command. Fire-and-forget: no correlation, no retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Control {
        crane_id: String,
        #[serde(flatten)]
        values: ControlValues,
    },
    Scenario {
        scenario_id: String,
    },
    StopAll,
    SimSpeed {
        speed: f64,
    },
}

impl Command {
    pub fn control(crane_id: impl Into<String>, values: ControlValues) -> Result<Self, CommandError> {
        let crane_id = crane_id.into();
        if crane_id.is_empty() {
            return Err(CommandError::EmptyCraneId);
        }
        if values.is_empty() {
            return Err(CommandError::EmptyControl(crane_id));
        }
        values.check_finite()?;
        Ok(Command::Control { crane_id, values })
    }

    pub fn scenario(scenario_id: impl Into<String>) -> Result<Self, CommandError> {
        let scenario_id = scenario_id.into();
        if scenario_id.is_empty() {
            return Err(CommandError::EmptyScenarioId);
        }
        Ok(Command::Scenario { scenario_id })
    }

    pub fn stop_all() -> Self {
        Command::StopAll
    }

    pub fn sim_speed(speed: f64) -> Result<Self, CommandError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(CommandError::InvalidSpeed(speed));
        }
        Ok(Command::SimSpeed { speed })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Control { .. } => "control",
            Command::Scenario { .. } => "scenario",
            Command::StopAll => "stop_all",
            Command::SimSpeed { .. } => "sim_speed",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Scenario list (HTTP)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioList {
    #[serde(default, deserialize_with = "lenient_list")]
    pub scenarios: Vec<ScenarioInfo>,
}

// ---------------------------------------------------------------------------
// Connection status (visible surface)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Server paths, as constants.
pub mod paths {
    pub const WEBSOCKET: &str = "/ws";
    pub const SCENARIOS: &str = "/api/scenarios";
}

/// Join a base URL and an absolute path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// HTTP base for a WebSocket endpoint: `ws://h:8000/ws` → `http://h:8000`.
pub fn api_base_from_endpoint(endpoint: &str) -> String {
    let (scheme, rest) = match endpoint.split_once("://") {
        Some(("wss", rest)) => ("https", rest),
        Some((_, rest)) => ("http", rest),
        None => ("http", endpoint),
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    format!("{scheme}://{authority}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "status": {
            "crane_alerts": {"TC-1": "DANGER", "TC-2": "DANGER", "TC-3": "NORMAL"},
            "recent_events": [
                {"timestamp": 1700000000.5, "pair": "TC-1↔TC-2",
                 "from_level": "WARNING", "to_level": "DANGER", "distance": 2.1}
            ],
            "highest_alert": "DANGER"
        },
        "cranes": [
            {"id": "TC-1", "name": "1호기", "base_x": 0, "base_y": 0,
             "mast_height": 40, "boom_length": 60, "slew_angle": 45,
             "slew_speed": 0.3, "luffing_angle": 15, "working_radius": 57.96}
        ],
        "collisions": [
            {"crane_a_id": "TC-1", "crane_b_id": "TC-2", "current_distance": 2.1,
             "boom_tip_distance": 3.0, "time_to_collision": null, "alert_level": "DANGER"}
        ],
        "alerts": [{"alert_level": "DANGER", "message": "stop"}]
    }"#;

    // ---------------------------------------------------------------
    // Alert level
    // ---------------------------------------------------------------

    #[test]
    fn alert_levels_are_totally_ordered() {
        assert!(AlertLevel::Normal < AlertLevel::Caution);
        assert!(AlertLevel::Caution < AlertLevel::Warning);
        assert!(AlertLevel::Warning < AlertLevel::Danger);
        assert_eq!(AlertLevel::default(), AlertLevel::Normal);
    }

    #[test]
    fn unknown_or_null_level_reads_as_normal() {
        let c: CollisionRecord =
            serde_json::from_str(r#"{"alert_level": "PURPLE"}"#).expect("valid");
        assert_eq!(c.alert_level, AlertLevel::Normal);
        let c: CollisionRecord =
            serde_json::from_str(r#"{"alert_level": null}"#).expect("valid");
        assert_eq!(c.alert_level, AlertLevel::Normal);
    }

    #[test]
    fn level_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&AlertLevel::Warning).unwrap(),
            "\"WARNING\""
        );
    }

    // ---------------------------------------------------------------
    // Classification
    // ---------------------------------------------------------------

    #[test]
    fn classify_full_snapshot() {
        match classify_frame(FULL).expect("snapshot") {
            InboundFrame::Snapshot(s) => {
                assert_eq!(s.cranes.len(), 1);
                assert_eq!(s.cranes[0].name, "1호기");
                assert_eq!(s.alert_level_of("TC-1"), AlertLevel::Danger);
                assert_eq!(s.alert_level_of("missing"), AlertLevel::Normal);
                assert_eq!(s.status.recent_events[0].to_level, AlertLevel::Danger);
                assert_eq!(s.collisions[0].ttc(), TimeToCollision::NotConverging);
                assert_eq!(s.highest_alert(), AlertLevel::Danger);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn classify_malformed() {
        assert!(matches!(classify_frame("{not json"), Err(FrameError::Json(_))));
        assert!(matches!(classify_frame("[1,2]"), Err(FrameError::NotAnObject)));
        assert!(matches!(classify_frame("42"), Err(FrameError::NotAnObject)));
    }

    #[test]
    fn mistyped_fields_keep_the_rest_of_the_frame() {
        let frame = r#"{
            "cranes": [
                {"id": "A", "working_radius": "n/a", "slew_angle": "fast"},
                {"id": "B", "slew_angle": 90},
                "not a crane"
            ],
            "collisions": [{"crane_a_id": "A", "crane_b_id": "B",
                            "time_to_collision": "soon", "alert_level": 7}],
            "status": {"crane_alerts": {"A": 3, "B": "WARNING"},
                       "recent_events": {"oops": true}},
            "simulation": "running"
        }"#;
        let s = match classify_frame(frame).expect("snapshot") {
            InboundFrame::Snapshot(s) => s,
            other => panic!("expected snapshot, got {other:?}"),
        };
        let ids: Vec<&str> = s.cranes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert_eq!(s.cranes[0].working_radius, None);
        assert_eq!(s.cranes[0].slew_angle, 0.0);
        assert_eq!(s.cranes[1].slew_angle, 90.0);
        assert_eq!(s.collisions[0].ttc(), TimeToCollision::NotConverging);
        assert_eq!(s.collisions[0].alert_level, AlertLevel::Normal);
        assert_eq!(s.alert_level_of("A"), AlertLevel::Normal);
        assert_eq!(s.alert_level_of("B"), AlertLevel::Warning);
        assert!(s.status.recent_events.is_empty());
        assert!(s.simulation.is_none());
    }

    #[test]
    fn non_list_collections_read_as_empty() {
        match classify_frame(r#"{"cranes": "nope", "alerts": 5}"#).unwrap() {
            InboundFrame::Snapshot(s) => {
                assert!(s.cranes.is_empty());
                assert!(s.alerts.is_empty());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn error_field_wins_over_ack_and_data() {
        let frame = r#"{"error": "bad type", "ack": true, "cranes": []}"#;
        assert_eq!(
            classify_frame(frame).unwrap(),
            InboundFrame::ServerError("bad type".into())
        );
    }

    #[test]
    fn ack_frame() {
        let frame = r#"{"ack": true, "type": "control"}"#;
        assert_eq!(
            classify_frame(frame).unwrap(),
            InboundFrame::Ack(Ack {
                kind: Some("control".into())
            })
        );
    }

    #[test]
    fn empty_object_is_an_empty_snapshot() {
        match classify_frame("{}").unwrap() {
            InboundFrame::Snapshot(s) => assert_eq!(*s, Snapshot::default()),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn null_collections_read_as_empty() {
        let frame = r#"{"cranes": null, "collisions": null, "alerts": null,
                        "status": {"crane_alerts": null, "recent_events": null}}"#;
        match classify_frame(frame).unwrap() {
            InboundFrame::Snapshot(s) => {
                assert!(s.cranes.is_empty());
                assert!(s.collisions.is_empty());
                assert!(s.status.crane_alerts.is_empty());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    // ---------------------------------------------------------------
    // Cranes & collisions
    // ---------------------------------------------------------------

    #[test]
    fn working_radius_falls_back_to_geometry() {
        let c = CraneState {
            boom_length: 60.0,
            luffing_angle: 60.0,
            ..Default::default()
        };
        assert!((c.working_radius() - 30.0).abs() < 1e-9);
        let c = CraneState {
            working_radius: Some(12.5),
            ..c
        };
        assert_eq!(c.working_radius(), 12.5);
    }

    #[test]
    fn ttc_keeps_three_way_distinction() {
        let mut c = CollisionRecord::default();
        assert_eq!(c.ttc(), TimeToCollision::NotConverging);
        c.time_to_collision = Some(0.0);
        assert_eq!(c.ttc(), TimeToCollision::Imminent);
        c.time_to_collision = Some(4.5);
        assert_eq!(c.ttc(), TimeToCollision::In(4.5));
    }

    #[test]
    fn pair_key_is_order_independent() {
        let ab = CollisionRecord {
            crane_a_id: "A".into(),
            crane_b_id: "B".into(),
            ..Default::default()
        };
        let ba = CollisionRecord {
            crane_a_id: "B".into(),
            crane_b_id: "A".into(),
            ..Default::default()
        };
        assert_eq!(ab.pair_key(), ba.pair_key());
        assert_eq!(ab.pair_key(), ("A", "B"));
    }

    // ---------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------

    #[test]
    fn control_command_wire_shape() {
        let cmd = Command::control("X", ControlValues::default().slew_angle(45.0)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(v, serde_json::json!({"type": "control", "crane_id": "X", "slew_angle": 45.0}));
    }

    #[test]
    fn other_command_wire_shapes() {
        let json = |c: Command| -> serde_json::Value {
            serde_json::from_str(&c.to_json().unwrap()).unwrap()
        };
        assert_eq!(
            json(Command::scenario("approaching").unwrap()),
            serde_json::json!({"type": "scenario", "scenario_id": "approaching"})
        );
        assert_eq!(json(Command::stop_all()), serde_json::json!({"type": "stop_all"}));
        assert_eq!(
            json(Command::sim_speed(2.0).unwrap()),
            serde_json::json!({"type": "sim_speed", "speed": 2.0})
        );
    }

    #[test]
    fn command_validation() {
        assert_eq!(
            Command::control("X", ControlValues::default()),
            Err(CommandError::EmptyControl("X".into()))
        );
        assert_eq!(
            Command::control("", ControlValues::default().slew_speed(1.0)),
            Err(CommandError::EmptyCraneId)
        );
        assert!(matches!(
            Command::control("X", ControlValues::default().slew_angle(f64::NAN)),
            Err(CommandError::NonFinite { field: "slew_angle", .. })
        ));
        assert_eq!(Command::sim_speed(0.0), Err(CommandError::InvalidSpeed(0.0)));
        assert!(Command::sim_speed(-1.0).is_err());
        assert!(Command::sim_speed(f64::INFINITY).is_err());
        assert_eq!(Command::scenario(""), Err(CommandError::EmptyScenarioId));
    }

    // ---------------------------------------------------------------
    // Scenario list & urls
    // ---------------------------------------------------------------

    #[test]
    fn scenario_list_parses() {
        let body = r#"{"scenarios": [{"id": "approaching", "name": "접근 상황", "description": "two cranes"}]}"#;
        let list: ScenarioList = serde_json::from_str(body).unwrap();
        assert_eq!(list.scenarios.len(), 1);
        assert_eq!(list.scenarios[0].id, "approaching");
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://h:8000/", "/api/scenarios"), "http://h:8000/api/scenarios");
        assert_eq!(join_url("http://h:8000", "api/scenarios"), "http://h:8000/api/scenarios");
    }

    #[test]
    fn api_base_follows_endpoint() {
        assert_eq!(api_base_from_endpoint("ws://localhost:8000/ws"), "http://localhost:8000");
        assert_eq!(api_base_from_endpoint("wss://site.example/ws"), "https://site.example");
        assert_eq!(api_base_from_endpoint("site:9000"), "http://site:9000");
    }
}
