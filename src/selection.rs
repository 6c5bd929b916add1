use std::collections::BTreeMap;

use crate::position::BoardState;
use crate::types::{MoveCandidate, PieceKind, Square};

/// Destination square to the moves landing there. More than one entry per
/// destination only when the moves differ by promotion piece.
pub type LegalDestinationMap = BTreeMap<Square, Vec<MoveCandidate>>;

/// Groups validator moves by destination, keeping their order.
/// Moves that do not start on `from` are dropped.
pub fn rekey(from: Square, moves: &[MoveCandidate]) -> LegalDestinationMap {
    let mut map = LegalDestinationMap::new();
    for mv in moves {
        if mv.from != from {
            log::debug!("ignoring {mv}: not a move from {from}");
            continue;
        }
        map.entry(mv.to).or_default().push(*mv);
    }
    map
}

/// Queen promotion if offered, otherwise the first candidate.
pub fn preferred(candidates: &[MoveCandidate]) -> Option<MoveCandidate> {
    candidates
        .iter()
        .find(|mv| mv.promotion == Some(PieceKind::Queen))
        .or_else(|| candidates.first())
        .copied()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    Selected {
        square: Square,
        destinations: LegalDestinationMap,
    },
}

/// Follow-up work requested by a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAction {
    Ignored,
    /// Ask the validator for the legal moves of this occupied square.
    Query(Square),
    Deselected,
    /// Selection is back to Idle; hand this move to the pipeline.
    Move(MoveCandidate),
}

impl SelectionState {
    pub fn selected_square(&self) -> Option<Square> {
        match self {
            SelectionState::Idle => None,
            SelectionState::Selected { square, .. } => Some(*square),
        }
    }

    pub fn destinations(&self) -> Option<&LegalDestinationMap> {
        match self {
            SelectionState::Idle => None,
            SelectionState::Selected { destinations, .. } => Some(destinations),
        }
    }

    pub fn clear(&mut self) {
        *self = SelectionState::Idle;
    }

    /// Click transition. While Selected, clicks on squares that are neither
    /// the selected square nor a destination are ignored; the player must
    /// deselect before picking another piece.
    pub fn click(&mut self, square: Square, board: &BoardState) -> SelectionAction {
        match self {
            SelectionState::Idle => {
                if board.get(square).is_some() {
                    SelectionAction::Query(square)
                } else {
                    SelectionAction::Ignored
                }
            }
            SelectionState::Selected {
                square: selected,
                destinations,
            } => {
                if square == *selected {
                    self.clear();
                    return SelectionAction::Deselected;
                }
                match destinations.get(&square).and_then(|c| preferred(c)) {
                    Some(mv) => {
                        self.clear();
                        SelectionAction::Move(mv)
                    }
                    None => SelectionAction::Ignored,
                }
            }
        }
    }

    /// Applies a legal-destination answer for `square`. Selects only from
    /// Idle and only when at least one destination exists.
    pub fn resolve(&mut self, square: Square, moves: &[MoveCandidate]) -> bool {
        if !matches!(self, SelectionState::Idle) {
            return false;
        }
        let destinations = rekey(square, moves);
        if destinations.is_empty() {
            log::debug!("{square} has no legal destinations");
            return false;
        }
        *self = SelectionState::Selected {
            square,
            destinations,
        };
        true
    }
}
