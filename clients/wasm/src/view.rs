//! JSON view model handed to the page's `onSnapshot` callback.
//!
//! Pure Rust so it can be unit-tested natively.

use crane_console::panels::{AlertSummary, EventLogView};
use crane_console::protocol::Snapshot;
use crane_console::scene::level_color;
use serde_json::{json, Value};

pub fn snapshot_view(summary: &AlertSummary, events: &EventLogView, snapshot: &Snapshot) -> Value {
    let cranes: Vec<Value> = snapshot
        .cranes
        .iter()
        .map(|c| {
            let level = snapshot.alert_level_of(&c.id);
            json!({
                "id": c.id,
                "name": c.display_name(),
                "slewAngle": c.slew_angle,
                "slewSpeed": c.slew_speed,
                "luffingAngle": c.luffing_angle,
                "workingRadius": c.working_radius(),
                "active": c.is_active(),
                "level": level.as_str(),
                "color": level_color(level).hex(),
            })
        })
        .collect();

    let pairs: Vec<Value> = snapshot
        .collisions
        .iter()
        .map(|p| {
            json!({
                "a": p.crane_a_id,
                "b": p.crane_b_id,
                "distance": p.current_distance,
                "tipDistance": p.boom_tip_distance,
                "ttc": p.ttc().to_string(),
                "level": p.alert_level.as_str(),
                "color": level_color(p.alert_level).hex(),
            })
        })
        .collect();

    let alerts: Vec<Value> = summary
        .alerts
        .iter()
        .map(|a| json!({ "level": a.alert_level.as_str(), "message": a.message }))
        .collect();

    json!({
        "highest": summary.highest.as_str(),
        "headline": summary.headline(),
        "craneCount": summary.crane_count,
        "activeCranes": summary.active_cranes,
        "pairCounts": {
            "NORMAL": summary.pair_counts[0],
            "CAUTION": summary.pair_counts[1],
            "WARNING": summary.pair_counts[2],
            "DANGER": summary.pair_counts[3],
        },
        "alerts": alerts,
        "events": events.lines(),
        "cranes": cranes,
        "pairs": pairs,
        "simulation": snapshot.simulation,
    })
}
