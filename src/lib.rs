use wasm_bindgen::prelude::*;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod pipeline;
pub mod position;
pub mod selection;
pub mod types;
pub mod validator;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use game::{ClickOutcome, GameSession, handle_click};

#[wasm_bindgen]
pub fn wasm_ready() -> bool {
    true
}

/// Routes `log` output to the browser console. Unknown levels fall back to
/// `info`; calling it twice is harmless.
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    console_error_panic_hook::set_once();
    let level = level.parse().unwrap_or(log::Level::Info);
    console_log::init_with_level(level).ok();
}
