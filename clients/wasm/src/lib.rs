//! Browser build of the crane console.
//!
//! The sans-IO core from `crane-console` runs unchanged; this crate only
//! supplies the browser pieces around it: the WebSocket link and reconnect
//! timer (`bridge`), the three.js adapter (`three`), the panel view model
//! handed to the page (`view`) and the exported [`CraneConsoleClient`].
//!
//! ```bash
//! wasm-pack build --target web --release   # or --dev while iterating
//! ```

pub mod bridge;
pub mod client;
pub mod events;
pub mod three;
pub mod view;

pub use client::CraneConsoleClient;

use wasm_bindgen::prelude::*;

/// Runs once when the page calls `init()`: routes Rust panics and `log`
/// records to the DevTools console.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Debug).is_err() {
        return;
    }
    log::info!("[console] crane-console-wasm {} ready", env!("CARGO_PKG_VERSION"));
}
