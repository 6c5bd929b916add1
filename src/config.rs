use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, ClientResult};
use crate::position::Position;

/// Per-board settings. Every field has a default, so a host may pass a
/// partial object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub move_path: String,
    pub legal_moves_path: String,
    pub search_depth: u8,
    /// `None` plays untimed.
    pub initial_minutes: Option<u32>,
    pub board_width: u32,
    /// No default: hosts that want a deadline on move submission set one.
    pub submit_timeout_ms: Option<u64>,
    pub start_position: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001".to_string(),
            move_path: "/move".to_string(),
            legal_moves_path: "/legal_moves".to_string(),
            search_depth: 2,
            initial_minutes: Some(10),
            board_width: 560,
            submit_timeout_ms: None,
            start_position: "start".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> ClientResult<()> {
        let invalid = |message: &str| {
            Err(ClientError::Config {
                message: message.to_string(),
            })
        };
        if self.base_url.trim().is_empty() {
            return invalid("base_url must not be empty");
        }
        if self.search_depth == 0 {
            return invalid("search_depth must be at least 1");
        }
        if self.initial_minutes == Some(0) {
            return invalid("initial_minutes must be positive; omit it for untimed play");
        }
        if self.submit_timeout_ms == Some(0) {
            return invalid("submit_timeout_ms must be positive");
        }
        Position::parse(&self.start_position)?;
        Ok(())
    }

    pub fn initial_seconds(&self) -> Option<u32> {
        self.initial_minutes.map(|m| m.saturating_mul(60))
    }

    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }

    pub fn start_position(&self) -> ClientResult<Position> {
        Position::parse(&self.start_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_seconds(), Some(600));
        assert_eq!(config.submit_timeout(), None);
    }

    #[test]
    fn partial_object_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"search_depth": 4, "initial_minutes": null}"#).unwrap();
        assert_eq!(config.search_depth, 4);
        assert_eq!(config.initial_minutes, None);
        assert_eq!(config.move_path, "/move");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            ClientConfig {
                search_depth: 0,
                ..ClientConfig::default()
            },
            ClientConfig {
                initial_minutes: Some(0),
                ..ClientConfig::default()
            },
            ClientConfig {
                base_url: " ".to_string(),
                ..ClientConfig::default()
            },
            ClientConfig {
                start_position: "not a position".to_string(),
                ..ClientConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }
}
