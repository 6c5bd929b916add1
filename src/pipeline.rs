use serde::Serialize;

use crate::error::ClientResult;
use crate::position::{BoardState, Position};
use crate::types::{GameOutcome, MoveCandidate, PieceCode, Side};
use crate::validator::{SubmitMoveRequest, SubmitMoveResponse};

/// A move applied to the local board ahead of the validator's verdict,
/// together with what is needed to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    mv: MoveCandidate,
    prior_position: Position,
    prior_active: Side,
    from_before: Option<PieceCode>,
    to_before: Option<PieceCode>,
}

/// How a submission settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MoveOutcome {
    Committed {
        position: Position,
        engine_move: Option<MoveCandidate>,
        game_over: Option<GameOutcome>,
    },
    Rejected {
        reason: String,
    },
    Failed {
        message: String,
    },
}

impl PendingMove {
    /// Snapshots `from`/`to` and moves the piece locally. Whatever stood on
    /// `to` is simply overwritten; the confirmed position replaces this edit.
    pub fn apply(
        board: &mut BoardState,
        position: &Position,
        mv: MoveCandidate,
        active: Side,
    ) -> Self {
        let from_before = board.get(mv.from);
        let to_before = board.get(mv.to);

        if let Some(piece) = from_before {
            let landed = match mv.promotion {
                Some(kind) => PieceCode::new(piece.side, kind),
                None => piece,
            };
            board.set(mv.from, None);
            board.set(mv.to, Some(landed));
        }

        Self {
            mv,
            prior_position: position.clone(),
            prior_active: active,
            from_before,
            to_before,
        }
    }

    pub fn mv(&self) -> MoveCandidate {
        self.mv
    }

    pub fn prior_position(&self) -> &Position {
        &self.prior_position
    }

    /// Side the clock charged before the optimistic flip.
    pub fn prior_active(&self) -> Side {
        self.prior_active
    }

    pub fn request(&self, depth: u8) -> SubmitMoveRequest {
        SubmitMoveRequest {
            fen: self.prior_position.as_str().to_string(),
            mv: self.mv,
            depth,
        }
    }

    pub fn rollback(&self, board: &mut BoardState) {
        board.set(self.mv.from, self.from_before);
        board.set(self.mv.to, self.to_before);
    }

    /// Commits the authoritative position or rolls the board back.
    pub fn settle(
        &self,
        board: &mut BoardState,
        result: ClientResult<SubmitMoveResponse>,
    ) -> MoveOutcome {
        let outcome = classify(result);
        match &outcome {
            MoveOutcome::Committed { position, .. } => *board = position.board(),
            MoveOutcome::Rejected { reason } => {
                log::warn!("validator rejected {}: {reason}", self.mv);
                self.rollback(board);
            }
            MoveOutcome::Failed { message } => {
                log::warn!("submitting {} failed: {message}", self.mv);
                self.rollback(board);
            }
        }
        outcome
    }
}

fn classify(result: ClientResult<SubmitMoveResponse>) -> MoveOutcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            return MoveOutcome::Failed {
                message: err.to_string(),
            };
        }
    };

    let fen = match response.fen.as_deref() {
        Some(fen) if response.ok => fen,
        _ => {
            return MoveOutcome::Rejected {
                reason: response.error.unwrap_or_else(|| "unknown".to_string()),
            };
        }
    };

    // An unreadable position is treated like a garbled response.
    let position = match Position::parse(fen) {
        Ok(position) => position,
        Err(err) => {
            return MoveOutcome::Failed {
                message: err.to_string(),
            };
        }
    };

    let engine_move = response.engine_move.as_deref().and_then(|raw| {
        raw.parse::<MoveCandidate>()
            .map_err(|err| log::warn!("ignoring reply move: {err}"))
            .ok()
    });

    let game_over = response.game_over.then(|| GameOutcome {
        winner: response.winner,
        reason: response.reason.clone(),
    });

    MoveOutcome::Committed {
        position,
        engine_move,
        game_over,
    }
}
