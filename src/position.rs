use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{ClientError, ClientResult};
use crate::types::{BOARD_WIDTH, PieceCode, Side, Square};

/// Standard initial position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
/// Shorthand accepted anywhere a position encoding is expected.
pub const START_ALIAS: &str = "start";

static STANDARD_BOARD: Lazy<BoardState> = Lazy::new(|| decode(START_FEN));

/// Authoritative position as serialized by the validator.
///
/// Only piece placement and side to move are interpreted; castling rights,
/// en-passant target and move counters are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    pub fn start() -> Self {
        Self(START_FEN.to_string())
    }

    /// Accepts `"start"` or any encoding whose placement field decodes.
    pub fn parse(encoding: &str) -> ClientResult<Self> {
        let trimmed = encoding.trim();
        if trimmed == START_ALIAS {
            return Ok(Self::start());
        }
        try_decode(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn placement(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or("")
    }

    /// `None` when the encoding carries no (or an unknown) side-to-move field.
    pub fn side_to_move(&self) -> Option<Side> {
        self.0.split_whitespace().nth(1).and_then(Side::from_fen_field)
    }

    pub fn board(&self) -> BoardState {
        decode(&self.0)
    }
}

/// Square to piece mapping. Absent squares are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    squares: BTreeMap<Square, PieceCode>,
}

impl BoardState {
    pub fn standard() -> Self {
        STANDARD_BOARD.clone()
    }

    pub fn get(&self, square: Square) -> Option<PieceCode> {
        self.squares.get(&square).copied()
    }

    /// Sets or clears a square, returning the previous occupant.
    pub fn set(&mut self, square: Square, piece: Option<PieceCode>) -> Option<PieceCode> {
        match piece {
            Some(piece) => self.squares.insert(square, piece),
            None => self.squares.remove(&square),
        }
    }

    pub fn len(&self) -> usize {
        self.squares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Square, PieceCode)> + '_ {
        self.squares.iter().map(|(sq, piece)| (*sq, *piece))
    }

    pub fn count(&self, piece: PieceCode) -> u8 {
        self.squares.values().filter(|p| **p == piece).count() as u8
    }

    pub fn count_side(&self, side: Side) -> u8 {
        self.squares.values().filter(|p| p.side == side).count() as u8
    }

    /// Re-encodes the occupied squares as a placement field (rank 8 first).
    pub fn encode_placement(&self) -> String {
        let mut out = String::with_capacity(72);
        for rank in (0..BOARD_WIDTH).rev() {
            let mut gap = 0u8;
            for file in 0..BOARD_WIDTH {
                let piece = Square::new(file, rank).and_then(|sq| self.get(sq));
                match piece {
                    Some(piece) => {
                        if gap > 0 {
                            out.push((b'0' + gap) as char);
                            gap = 0;
                        }
                        out.push(piece.to_fen_char());
                    }
                    None => gap += 1,
                }
            }
            if gap > 0 {
                out.push((b'0' + gap) as char);
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }
}

/// Decodes the placement field of a position encoding.
/// Returns an empty board when the encoding is malformed.
pub fn decode(encoding: &str) -> BoardState {
    try_decode(encoding).unwrap_or_else(|err| {
        log::warn!("{err}; showing an empty board");
        BoardState::default()
    })
}

/// Decodes the placement field, reporting why a malformed encoding failed.
/// Chess legality (piece counts, kings present) is not checked.
pub fn try_decode(encoding: &str) -> ClientResult<BoardState> {
    let encoding = encoding.trim();
    let encoding = if encoding == START_ALIAS {
        START_FEN
    } else {
        encoding
    };
    let malformed = |reason: String| ClientError::MalformedPosition { reason };

    let placement = encoding
        .split_whitespace()
        .next()
        .ok_or_else(|| malformed("empty encoding".to_string()))?;
    let rows: Vec<&str> = placement.split('/').collect();
    if rows.len() != BOARD_WIDTH as usize {
        return Err(malformed(format!("expected 8 ranks, got {}", rows.len())));
    }

    let mut board = BoardState::default();
    for (row_idx, row) in rows.iter().enumerate() {
        let rank = BOARD_WIDTH - 1 - row_idx as u8;
        let mut file = 0u8;
        for c in row.chars() {
            if let Some(gap) = c.to_digit(10) {
                if !(1..=8).contains(&gap) {
                    return Err(malformed(format!("bad gap {c:?} on rank {}", rank + 1)));
                }
                file += gap as u8;
            } else {
                let piece = PieceCode::from_fen_char(c)
                    .ok_or_else(|| malformed(format!("unknown piece {c:?}")))?;
                let square = Square::new(file, rank)
                    .ok_or_else(|| malformed(format!("rank {} overflows", rank + 1)))?;
                board.set(square, Some(piece));
                file += 1;
            }
            if file > BOARD_WIDTH {
                return Err(malformed(format!("rank {} overflows", rank + 1)));
            }
        }
        if file != BOARD_WIDTH {
            return Err(malformed(format!("rank {} has {file} files", rank + 1)));
        }
    }

    Ok(board)
}

/// Pieces missing from the board relative to the standard starting counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedSummary {
    /// Black pieces taken by white.
    pub white_taken: Vec<PieceCode>,
    /// White pieces taken by black.
    pub black_taken: Vec<PieceCode>,
}

impl CapturedSummary {
    /// Recomputed from scratch; ordering follows piece type, not capture
    /// chronology, which a single position cannot recover.
    pub fn from_board(board: &BoardState) -> Self {
        let mut summary = Self::default();
        for piece in PieceCode::ALL {
            let missing = piece.kind.start_count().saturating_sub(board.count(piece));
            let taken_by = match piece.side {
                Side::White => &mut summary.black_taken,
                Side::Black => &mut summary.white_taken,
            };
            taken_by.extend(std::iter::repeat_n(piece, missing as usize));
        }
        summary
    }
}

pub fn captured(encoding: &str) -> CapturedSummary {
    CapturedSummary::from_board(&decode(encoding))
}
