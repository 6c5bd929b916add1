//! Remote move validator interface
//!
//! The validator owns chess legality, produces the opponent's reply and
//! reports game termination. The client only relays positions and moves.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::position::Position;
use crate::types::{MoveCandidate, Square, Winner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitMoveRequest {
    /// Position before the player's move.
    pub fen: String,
    #[serde(rename = "move")]
    pub mv: MoveCandidate,
    pub depth: u8,
}

/// Answer to a move submission. `ok == false` or a missing `fen` is a
/// rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmitMoveResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub fen: Option<String>,
    /// Kept raw; a garbled reply move is not worth failing the exchange over.
    #[serde(default)]
    pub engine_move: Option<String>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub winner: Option<Winner>,
    #[serde(default, alias = "outcome")]
    pub reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WireAnswer for SubmitMoveResponse {
    const CONTRACT_FIELDS: &'static [&'static str] = &["ok", "error"];
}

impl SubmitMoveResponse {
    pub fn is_accepted(&self) -> bool {
        self.ok && self.fen.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegalMovesRequest {
    pub fen: String,
    pub square: Square,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LegalMovesResponse {
    #[serde(default)]
    pub moves: Vec<String>,
}

impl WireAnswer for LegalMovesResponse {
    const CONTRACT_FIELDS: &'static [&'static str] = &["moves"];
}

impl LegalMovesResponse {
    /// Parsed candidates; unparseable entries are dropped.
    pub fn candidates(&self) -> Vec<MoveCandidate> {
        self.moves
            .iter()
            .filter_map(|raw| match raw.parse() {
                Ok(mv) => Some(mv),
                Err(err) => {
                    log::warn!("validator sent {err}");
                    None
                }
            })
            .collect()
    }
}

/// A validator reply body. Every field is optional on the wire, so an error
/// status only counts as an answer when one of `CONTRACT_FIELDS` is present.
pub trait WireAnswer: DeserializeOwned {
    const CONTRACT_FIELDS: &'static [&'static str];
}

/// Decodes a reply. Rejections may arrive with a 4xx status; any other
/// error status is a transport failure.
pub fn read_answer<Resp: WireAnswer>(status: StatusCode, body: &[u8]) -> ClientResult<Resp> {
    if status.is_success() {
        return Ok(serde_json::from_slice(body)?);
    }
    let carries_contract = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .as_object()
                .map(|fields| Resp::CONTRACT_FIELDS.iter().any(|f| fields.contains_key(*f)))
        })
        .unwrap_or(false);
    if !carries_contract {
        return Err(ClientError::Transport {
            message: format!("validator answered {status}"),
        });
    }
    Ok(serde_json::from_slice(body)?)
}

/// Request/response collaborator. `submit_move` is not idempotent and must
/// never be retried automatically.
#[async_trait(?Send)]
pub trait Validator {
    async fn submit_move(&self, request: &SubmitMoveRequest) -> ClientResult<SubmitMoveResponse>;

    async fn legal_destinations(
        &self,
        position: &Position,
        square: Square,
    ) -> ClientResult<Vec<MoveCandidate>>;
}

/// HTTP+JSON validator.
#[derive(Debug, Clone)]
pub struct HttpValidator {
    client: reqwest::Client,
    move_url: String,
    legal_moves_url: String,
    /// Deadline for move submissions only.
    submit_timeout: Option<Duration>,
}

impl HttpValidator {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let base = config.base_url.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| ClientError::Config {
                message: format!("cannot build HTTP client: {err}"),
            })?;
        Ok(Self {
            client,
            move_url: format!("{base}{}", config.move_path),
            legal_moves_url: format!("{base}{}", config.legal_moves_path),
            submit_timeout: submit_timeout(config),
        })
    }

    async fn post<Req, Resp>(
        &self,
        url: &str,
        body: &Req,
        timeout: Option<Duration>,
    ) -> ClientResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: WireAnswer,
    {
        let mut request = self.client.post(url).json(body);
        if let Some(timeout) = timeout {
            request = with_timeout(request, timeout);
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        read_answer(status, &bytes)
    }
}

#[async_trait(?Send)]
impl Validator for HttpValidator {
    async fn submit_move(&self, request: &SubmitMoveRequest) -> ClientResult<SubmitMoveResponse> {
        log::debug!("POST {} move={} depth={}", self.move_url, request.mv, request.depth);
        self.post(&self.move_url, request, self.submit_timeout).await
    }

    async fn legal_destinations(
        &self,
        position: &Position,
        square: Square,
    ) -> ClientResult<Vec<MoveCandidate>> {
        let request = LegalMovesRequest {
            fen: position.as_str().to_string(),
            square,
        };
        let response: LegalMovesResponse = self
            .post(&self.legal_moves_url, &request, None)
            .await?;
        Ok(response.candidates())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn submit_timeout(config: &ClientConfig) -> Option<Duration> {
    config.submit_timeout()
}

#[cfg(target_arch = "wasm32")]
fn submit_timeout(config: &ClientConfig) -> Option<Duration> {
    // The fetch backend cannot abort a request on a deadline.
    if config.submit_timeout().is_some() {
        log::warn!("submit_timeout_ms is not supported in the browser build; ignoring");
    }
    None
}

#[cfg(not(target_arch = "wasm32"))]
fn with_timeout(request: reqwest::RequestBuilder, timeout: Duration) -> reqwest::RequestBuilder {
    request.timeout(timeout)
}

#[cfg(target_arch = "wasm32")]
fn with_timeout(request: reqwest::RequestBuilder, _timeout: Duration) -> reqwest::RequestBuilder {
    request
}
