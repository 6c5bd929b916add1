use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::ClockState;
use crate::error::ClientError;

pub const BOARD_WIDTH: u8 = 8;

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Parses the side-to-move field of a position encoding (`w` / `b`).
    pub fn from_fen_field(field: &str) -> Option<Self> {
        match field {
            "w" => Some(Side::White),
            "b" => Some(Side::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::White => "white",
            Side::Black => "black",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Number of pieces of this kind each side starts with.
    pub fn start_count(self) -> u8 {
        match self {
            PieceKind::Pawn => 8,
            PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook => 2,
            PieceKind::Queen | PieceKind::King => 1,
        }
    }

    /// Lowercase letter, as used in promotion suffixes.
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

/// A coloured piece. Serialized as its placement letter (`P`, `n`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "char")]
pub struct PieceCode {
    pub side: Side,
    pub kind: PieceKind,
}

impl PieceCode {
    /// All 12 piece codes, white first, each side ordered pawn to king.
    pub const ALL: [PieceCode; 12] = [
        PieceCode::new(Side::White, PieceKind::Pawn),
        PieceCode::new(Side::White, PieceKind::Knight),
        PieceCode::new(Side::White, PieceKind::Bishop),
        PieceCode::new(Side::White, PieceKind::Rook),
        PieceCode::new(Side::White, PieceKind::Queen),
        PieceCode::new(Side::White, PieceKind::King),
        PieceCode::new(Side::Black, PieceKind::Pawn),
        PieceCode::new(Side::Black, PieceKind::Knight),
        PieceCode::new(Side::Black, PieceKind::Bishop),
        PieceCode::new(Side::Black, PieceKind::Rook),
        PieceCode::new(Side::Black, PieceKind::Queen),
        PieceCode::new(Side::Black, PieceKind::King),
    ];

    pub const fn new(side: Side, kind: PieceKind) -> Self {
        Self { side, kind }
    }

    pub fn from_fen_char(c: char) -> Option<Self> {
        let kind = PieceKind::from_letter(c)?;
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        Some(Self { side, kind })
    }

    pub fn to_fen_char(self) -> char {
        let letter = self.kind.letter();
        match self.side {
            Side::White => letter.to_ascii_uppercase(),
            Side::Black => letter,
        }
    }
}

impl From<PieceCode> for char {
    fn from(piece: PieceCode) -> char {
        piece.to_fen_char()
    }
}

/// A board coordinate. `file` and `rank` are zero-based (a1 = 0,0).
/// Serialized in its two-character form, e.g. `"e4"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if file < BOARD_WIDTH && rank < BOARD_WIDTH {
            Some(Self { file, rank })
        } else {
            None
        }
    }

    pub fn file(self) -> u8 {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }

    /// Every square, a1 through h8 in rank-major order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..BOARD_WIDTH).flat_map(|rank| (0..BOARD_WIDTH).map(move |file| Square { file, rank }))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl FromStr for Square {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ClientError::InvalidSquare(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(invalid());
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Square {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> String {
        square.to_string()
    }
}

/// A single half-move: `<from><to>[promotion]`, e.g. `e2e4` or `e7e8q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MoveCandidate {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl MoveCandidate {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, kind: PieceKind) -> Self {
        self.promotion = Some(kind);
        self
    }
}

impl fmt::Display for MoveCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.letter())?;
        }
        Ok(())
    }
}

impl FromStr for MoveCandidate {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ClientError::InvalidMove(s.to_string());
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(invalid());
        }
        let from: Square = s[0..2].parse().map_err(|_| invalid())?;
        let to: Square = s[2..4].parse().map_err(|_| invalid())?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(letter) => match PieceKind::from_letter(letter) {
                Some(kind) if !matches!(kind, PieceKind::Pawn | PieceKind::King) => Some(kind),
                _ => return Err(invalid()),
            },
        };
        Ok(Self { from, to, promotion })
    }
}

impl TryFrom<String> for MoveCandidate {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MoveCandidate> for String {
    fn from(mv: MoveCandidate) -> String {
        mv.to_string()
    }
}

/// Declared result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl From<Side> for Winner {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Winner::White,
            Side::Black => Winner::Black,
        }
    }
}

/// Terminal state of a game. Both fields are optional because the
/// validator may only report that the game is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameOutcome {
    pub winner: Option<Winner>,
    pub reason: Option<String>,
}

impl GameOutcome {
    pub fn timeout(expired: Side) -> Self {
        Self {
            winner: Some(expired.opponent().into()),
            reason: Some("timeout".to_string()),
        }
    }

    pub fn message(&self) -> String {
        let reason = self
            .reason
            .as_deref()
            .map(|r| format!(" ({r})"))
            .unwrap_or_default();
        match self.winner {
            Some(Winner::White) => format!("Game over: white wins{reason}"),
            Some(Winner::Black) => format!("Game over: black wins{reason}"),
            Some(Winner::Draw) => format!("Game over: draw{reason}"),
            None => format!("Game over{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SquareView {
    pub square: Square,
    pub piece: PieceCode,
}

/// A highlighted destination of the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationView {
    pub square: Square,
    pub capture: bool,
}

/// Public session state returned from WASM APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub fen: String,
    pub pieces: Vec<SquareView>,
    pub selected: Option<Square>,
    pub destinations: Vec<DestinationView>,
    /// Black pieces white has taken.
    pub white_taken: Vec<PieceCode>,
    /// White pieces black has taken.
    pub black_taken: Vec<PieceCode>,
    /// `None` when playing untimed.
    pub clock: Option<ClockState>,
    pub active_side: Side,
    pub is_thinking: bool,
    pub is_game_over: bool,
    pub outcome: Option<GameOutcome>,
    /// Contract:
    /// - After a confirmed exchange: the player's move, then the reply if any.
    /// - After a rollback: unchanged. Before the first move: empty.
    pub last_move: Vec<MoveCandidate>,
    pub board_width: u32,
}
