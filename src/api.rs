//! Browser-facing wrapper around [`GameSession`].

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::clock::WallTicks;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::game::{GameSession, handle_click};
use crate::position::Position;
use crate::types::Square;
use crate::validator::{HttpValidator, Validator};

#[wasm_bindgen]
pub struct ChessClient {
    session: Rc<RefCell<GameSession>>,
    validator: Rc<dyn Validator>,
    ticks: WallTicks,
}

#[wasm_bindgen]
impl ChessClient {
    /// `config` may be `undefined` or a partial [`ClientConfig`] object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<ChessClient, JsValue> {
        let config: ClientConfig = if config.is_undefined() || config.is_null() {
            ClientConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let validator = HttpValidator::new(&config).map_err(to_js_error)?;
        let session = GameSession::new(config).map_err(to_js_error)?;
        Ok(ChessClient {
            session: Rc::new(RefCell::new(session)),
            validator: Rc::new(validator),
            ticks: WallTicks::new(),
        })
    }

    /// Resolves to the click outcome once any validator exchange settles.
    pub fn click(&self, square: &str) -> Result<js_sys::Promise, JsValue> {
        let square: Square = square.parse().map_err(to_js_error)?;
        let session = Rc::clone(&self.session);
        let validator = Rc::clone(&self.validator);
        Ok(future_to_promise(async move {
            let outcome = handle_click(&session, validator.as_ref(), square).await;
            to_js_value(&outcome)
        }))
    }

    /// Call from a repeating host timer. Returns the timeout result, or
    /// `null` while the game goes on.
    pub fn poll_clock(&mut self) -> Result<JsValue, JsValue> {
        let outcome = self.session.borrow_mut().advance_clock(&mut self.ticks);
        to_js_value(&outcome)
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.session.borrow().view())
    }

    pub fn take_notices(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.session.borrow_mut().take_notices())
    }

    pub fn is_thinking(&self) -> bool {
        self.session.borrow().is_thinking()
    }

    /// Starts over from `position` (`"start"` or a full encoding).
    pub fn new_game(&mut self, position: &str) -> Result<(), JsValue> {
        let position = Position::parse(position).map_err(to_js_error)?;
        self.session.borrow_mut().reset(position);
        self.ticks.reset();
        Ok(())
    }
}

fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

fn to_js_error(err: ClientError) -> JsValue {
    JsError::new(&err.to_string()).into()
}
