//! Crane Console
//!
//! Live operator console core for the crane collision-warning simulation.
//! The server pushes a complete world snapshot about five times a second;
//! the console keeps one 3D visual per crane in sync with it, draws warning
//! lines between converging booms, and sends operator commands back.
//!
//! ## Architecture
//!
//! ```text
//! Console  (console.rs)            ← host link events in, commands out
//!   ├── Channel  (channel.rs)      ← connection state machine, reconnect
//!   │     └── protocol.rs          ← frame classification, commands
//!   └── SnapshotDispatcher  (dispatch.rs)
//!         ├── SceneReconciler  (scene.rs) ← Visual Objects + overlay
//!         │     └── transform.rs          ← domain → render frame
//!         └── PanelRenderer*   (panels.rs)
//! ```
//!
//! The core does no IO. Hosts provide a [`channel::Connector`], a
//! [`channel::ReconnectTimer`] and a [`scene::RenderEngine`]:
//!
//! | Host            | Where                 | Engine                   |
//! |-----------------|-----------------------|--------------------------|
//! | native (tokio)  | `runtime.rs`, `bin/`  | [`headless::HeadlessScene`] |
//! | browser (wasm)  | `clients/wasm`        | three.js adapter         |

// Sans-IO core (always available, also for wasm).
pub mod channel;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod headless;
pub mod panels;
pub mod protocol;
pub mod scene;
pub mod transform;
pub mod types;

// Native host modules require the `native` feature.
#[cfg(feature = "native")]
pub mod runtime;
#[cfg(feature = "native")]
pub mod settings;

pub use channel::{Channel, ConnectionState, Connector, ReconnectTimer, Socket};
pub use console::{Console, LinkEvent};
pub use dispatch::SnapshotDispatcher;
pub use error::{ChannelError, CommandError, FrameError};
pub use protocol::{AlertLevel, Command, ConnectionStatus, ControlValues, CraneState, Snapshot};
pub use scene::{RenderEngine, SceneReconciler};
pub use types::{ConsoleConfig, ReconnectPolicy, Rgb, Vec3};

#[cfg(feature = "native")]
pub use runtime::{FrameStats, NativeConsole, Runtime};
#[cfg(feature = "native")]
pub use settings::ConfigError;
