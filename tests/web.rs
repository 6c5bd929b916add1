//! Browser smoke tests for the wasm facade.
//!
//! Run with: wasm-pack test --headless --chrome
#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use chessboard_client::api::ChessClient;
use chessboard_client::{init_logging, wasm_ready};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn module_loads() {
    assert!(wasm_ready());
    init_logging("debug");
    log::info!("logging reaches the console");
}

#[wasm_bindgen_test]
fn client_builds_with_default_config() {
    let client = ChessClient::new(JsValue::UNDEFINED).expect("default config is valid");
    assert!(!client.is_thinking());
    let state = client.state().expect("state serializes");
    assert!(state.is_object());
}

#[wasm_bindgen_test]
fn new_game_rejects_garbage() {
    let mut client = ChessClient::new(JsValue::NULL).expect("default config is valid");
    assert!(client.new_game("not a position").is_err());
    assert!(client.new_game("start").is_ok());
}

#[wasm_bindgen_test]
fn click_rejects_bad_square() {
    let client = ChessClient::new(JsValue::UNDEFINED).expect("default config is valid");
    assert!(client.click("z9").is_err());
}
