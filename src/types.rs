//! Core types shared across all modules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Basic math (render frame)
// ---------------------------------------------------------------------------

/// A point or vector in the render engine's frame (Y up).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Euler rotation in radians, applied in `YXZ` order (yaw, then pitch in
/// the yawed frame, then roll).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Euler {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Euler {
    pub fn yaw_pitch(yaw: f64, pitch: f64) -> Self {
        Self {
            x: pitch,
            y: yaw,
            z: 0.0,
        }
    }
}

/// 24-bit RGB colour, `0xRRGGBB`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgb(pub u32);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:06X}", self.0 & 0x00FF_FFFF)
    }
}

// ---------------------------------------------------------------------------
// Reconnect policy & config
// ---------------------------------------------------------------------------

/// Delay schedule for reconnect attempts.
///
/// The default is a fixed 3 s delay repeated forever. A `multiplier`
/// above 1.0 grows the delay per consecutive failure up to `max_delay_ms`.
/// There is no attempt limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: 3000,
            multiplier: 1.0,
            max_delay_ms: 3000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.multiplier <= 1.0 || !self.multiplier.is_finite() {
            return Duration::from_millis(self.delay_ms);
        }
        let grown = self.delay_ms as f64 * self.multiplier.powi(attempt.min(32) as i32);
        let cap = self.max_delay_ms.max(self.delay_ms) as f64;
        Duration::from_millis(grown.min(cap) as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// WebSocket URL of the simulation server.
    pub endpoint: String,
    /// Base URL of the HTTP API (scenario list).
    pub api_base: String,
    pub reconnect: ReconnectPolicy,
    /// How many recent events the event log panel keeps.
    pub event_log_len: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000/ws".into(),
            api_base: "http://localhost:8000".into(),
            reconnect: ReconnectPolicy::default(),
            event_log_len: 20,
        }
    }
}
