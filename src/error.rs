//! Error types for the board client.
//!
//! None of these is fatal: each failure path leaves the session in a
//! playable state (Idle selection, last confirmed board, correct clock owner).

use thiserror::Error;

/// Errors that can occur while decoding positions or talking to the validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Position encoding could not be parsed.
    #[error("Malformed position: {reason}")]
    MalformedPosition { reason: String },

    /// No response, an HTTP error, or a response that could not be understood.
    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Invalid square: {0:?}")]
    InvalidSquare(String),

    #[error("Invalid move: {0:?}")]
    InvalidMove(String),

    /// A move submission is already in flight.
    #[error("Waiting for the validator")]
    Busy,

    /// Input arrived after the game ended.
    #[error("Game is already over")]
    GameOver,

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Transport {
            message: format!("unreadable response: {err}"),
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
