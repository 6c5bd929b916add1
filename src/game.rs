use std::cell::RefCell;

use serde::Serialize;

use crate::clock::{Clock, ClockState, TickSource};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::{MoveOutcome, PendingMove};
use crate::position::{BoardState, CapturedSummary, Position};
use crate::selection::{SelectionAction, SelectionState};
use crate::types::{
    DestinationView, GameOutcome, GameView, MoveCandidate, Side, Square, SquareView,
};
use crate::validator::{SubmitMoveRequest, SubmitMoveResponse, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Rejected,
    Connectivity,
    GameOver,
}

/// User-visible message raised at the point of failure or game end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Outstanding legal-destination lookup. Answers to superseded lookups are
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalQuery {
    pub square: Square,
    pub position: Position,
    seq: u64,
}

/// Work a click hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    Ignored,
    /// Input arrived while a move was in flight or after the game ended.
    Refused(ClientError),
    Deselected,
    Query(LegalQuery),
    /// The thinking gate is set; send this and pass the answer to
    /// [`GameSession::settle_move`].
    Submit(SubmitMoveRequest),
}

/// Final result of a click once any validator exchange has settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClickOutcome {
    Ignored,
    Refused {
        reason: String,
    },
    Deselected,
    Selected {
        square: Square,
        destinations: Vec<DestinationView>,
    },
    NoDestinations,
    /// `notices` are the ones this exchange raised; they stay queued for
    /// [`GameSession::take_notices`] as well.
    Moved {
        outcome: MoveOutcome,
        notices: Vec<Notice>,
    },
}

/// One board's worth of state: confirmed position, displayed board,
/// selection, clocks and the in-flight move, if any.
///
/// Sessions share nothing; two boards in one page need two sessions.
pub struct GameSession {
    config: ClientConfig,
    position: Position,
    board: BoardState,
    captured: CapturedSummary,
    selection: SelectionState,
    clock: Clock,
    timed: bool,
    pending: Option<PendingMove>,
    outcome: Option<GameOutcome>,
    last_move: Vec<MoveCandidate>,
    notices: Vec<Notice>,
    query_seq: u64,
    awaiting: Option<u64>,
}

impl GameSession {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let position = config.start_position()?;
        let timed = config.initial_seconds().is_some();
        let active = position.side_to_move().unwrap_or(Side::White);
        let mut session = Self {
            board: position.board(),
            captured: CapturedSummary::default(),
            selection: SelectionState::Idle,
            clock: Clock::new(config.initial_seconds().unwrap_or(0), active),
            timed,
            pending: None,
            outcome: None,
            last_move: Vec::new(),
            notices: Vec::new(),
            query_seq: 0,
            awaiting: None,
            position,
            config,
        };
        session.reset(session.position.clone());
        Ok(session)
    }

    /// Replaces the whole state bundle from `position`, e.g. for a new game
    /// or a full resynchronization. Any in-flight answer is discarded.
    pub fn reset(&mut self, position: Position) {
        let active = position
            .side_to_move()
            .unwrap_or_else(|| self.clock.active_side());
        self.board = position.board();
        self.captured = CapturedSummary::from_board(&self.board);
        self.position = position;
        self.selection.clear();
        self.clock = Clock::new(self.config.initial_seconds().unwrap_or(0), active);
        if self.timed {
            self.clock.start();
        }
        self.pending = None;
        self.outcome = None;
        self.last_move.clear();
        self.notices.clear();
        self.awaiting = None;
        log::info!("new game from {}", self.position.as_str());
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn captured(&self) -> &CapturedSummary {
        &self.captured
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn clock_state(&self) -> Option<ClockState> {
        self.timed.then(|| self.clock.state())
    }

    pub fn active_side(&self) -> Side {
        self.clock.active_side()
    }

    /// The thinking gate: set while a move submission is unsettled.
    pub fn is_thinking(&self) -> bool {
        self.pending.is_some()
    }

    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn last_move(&self) -> &[MoveCandidate] {
        &self.last_move
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn click(&mut self, square: Square) -> ClickAction {
        if self.outcome.is_some() {
            log::debug!("ignoring click on {square}: game is over");
            return ClickAction::Refused(ClientError::GameOver);
        }
        if self.pending.is_some() {
            log::debug!("ignoring click on {square}: waiting for the validator");
            return ClickAction::Refused(ClientError::Busy);
        }

        match self.selection.click(square, &self.board) {
            SelectionAction::Ignored => ClickAction::Ignored,
            SelectionAction::Deselected => ClickAction::Deselected,
            SelectionAction::Query(square) => {
                self.query_seq += 1;
                self.awaiting = Some(self.query_seq);
                ClickAction::Query(LegalQuery {
                    square,
                    position: self.position.clone(),
                    seq: self.query_seq,
                })
            }
            SelectionAction::Move(mv) => ClickAction::Submit(self.begin_move(mv)),
        }
    }

    /// Applies a legal-destination answer. Returns whether a piece is now
    /// selected.
    pub fn resolve_query(
        &mut self,
        query: &LegalQuery,
        result: ClientResult<Vec<MoveCandidate>>,
    ) -> bool {
        let current = self.awaiting == Some(query.seq)
            && query.position == self.position
            && self.pending.is_none()
            && self.outcome.is_none();
        if !current {
            log::debug!("discarding stale legal moves for {}", query.square);
            return false;
        }
        self.awaiting = None;

        match result {
            Ok(moves) => self.selection.resolve(query.square, &moves),
            Err(err) => {
                log::warn!("legal moves for {} unavailable: {err}", query.square);
                false
            }
        }
    }

    fn begin_move(&mut self, mv: MoveCandidate) -> SubmitMoveRequest {
        self.selection.clear();
        self.awaiting = None;
        let active = self.clock.active_side();
        let pending = PendingMove::apply(&mut self.board, &self.position, mv, active);
        // The validator's thinking time belongs to the opponent.
        self.clock.set_active_side(active.opponent());
        let request = pending.request(self.config.search_depth);
        log::debug!("submitting {mv}");
        self.pending = Some(pending);
        request
    }

    /// Settles the in-flight move. `None` when nothing was in flight, e.g.
    /// after a reset.
    pub fn settle_move(
        &mut self,
        result: ClientResult<SubmitMoveResponse>,
    ) -> Option<MoveOutcome> {
        self.settle_and_report(result).map(|(outcome, _)| outcome)
    }

    /// Like [`GameSession::settle_move`], also returning the notices the
    /// settlement raised.
    pub fn settle_and_report(
        &mut self,
        result: ClientResult<SubmitMoveResponse>,
    ) -> Option<(MoveOutcome, Vec<Notice>)> {
        let pending = self.pending.take()?;
        let queued = self.notices.len();
        let outcome = pending.settle(&mut self.board, result);
        self.selection.clear();

        match &outcome {
            MoveOutcome::Committed {
                position,
                engine_move,
                game_over,
            } => {
                self.position = position.clone();
                self.captured = CapturedSummary::from_board(&self.board);
                self.last_move = std::iter::once(pending.mv())
                    .chain(*engine_move)
                    .collect();
                if let Some(side) = position.side_to_move() {
                    self.clock.set_active_side(side);
                }
                log::info!(
                    "confirmed {}{}",
                    pending.mv(),
                    engine_move.map(|m| format!(", reply {m}")).unwrap_or_default()
                );
                if let Some(result) = game_over {
                    self.finish(result.clone());
                }
            }
            MoveOutcome::Rejected { reason } => {
                self.clock.set_active_side(pending.prior_active());
                self.notices.push(Notice {
                    kind: NoticeKind::Rejected,
                    message: format!("Server rejected move: {reason}"),
                });
            }
            MoveOutcome::Failed { message } => {
                let side = pending
                    .prior_position()
                    .side_to_move()
                    .unwrap_or(pending.prior_active());
                self.clock.set_active_side(side);
                self.notices.push(Notice {
                    kind: NoticeKind::Connectivity,
                    message: format!("Error contacting server: {message}"),
                });
            }
        }

        let raised = self.notices[queued..].to_vec();
        Some((outcome, raised))
    }

    /// One elapsed second.
    pub fn tick(&mut self) -> Option<GameOutcome> {
        self.advance(1)
    }

    /// Drains the tick source and charges the elapsed seconds.
    pub fn advance_clock(&mut self, source: &mut dyn TickSource) -> Option<GameOutcome> {
        let ticks = source.elapsed_ticks();
        self.advance(ticks)
    }

    fn advance(&mut self, ticks: u32) -> Option<GameOutcome> {
        if !self.timed || self.outcome.is_some() || ticks == 0 {
            return None;
        }
        let expired = self.clock.advance(ticks)?;
        let outcome = GameOutcome::timeout(expired);
        self.finish(outcome.clone());
        Some(outcome)
    }

    /// First terminal result wins; a later one (e.g. a checkmate confirmed
    /// after a flag fall) is only logged.
    fn finish(&mut self, outcome: GameOutcome) {
        self.clock.stop();
        self.selection.clear();
        if let Some(existing) = &self.outcome {
            log::info!(
                "already finished ({}); ignoring {}",
                existing.message(),
                outcome.message()
            );
            return;
        }
        let message = outcome.message();
        log::info!("{message}");
        self.notices.push(Notice {
            kind: NoticeKind::GameOver,
            message,
        });
        self.outcome = Some(outcome);
    }

    pub fn destination_views(&self) -> Vec<DestinationView> {
        let SelectionState::Selected {
            square,
            destinations,
        } = &self.selection
        else {
            return Vec::new();
        };
        let mover = self.board.get(*square).map(|p| p.side);
        destinations
            .keys()
            .map(|dest| DestinationView {
                square: *dest,
                capture: self
                    .board
                    .get(*dest)
                    .is_some_and(|p| Some(p.side) != mover),
            })
            .collect()
    }

    pub fn view(&self) -> GameView {
        GameView {
            fen: self.position.as_str().to_string(),
            pieces: self
                .board
                .iter()
                .map(|(square, piece)| SquareView { square, piece })
                .collect(),
            selected: self.selection.selected_square(),
            destinations: self.destination_views(),
            white_taken: self.captured.white_taken.clone(),
            black_taken: self.captured.black_taken.clone(),
            clock: self.clock_state(),
            active_side: self.clock.active_side(),
            is_thinking: self.is_thinking(),
            is_game_over: self.is_game_over(),
            outcome: self.outcome.clone(),
            last_move: self.last_move.clone(),
            board_width: self.config.board_width,
        }
    }
}

/// Runs one click to completion, awaiting the validator where needed.
///
/// The session is only borrowed between suspension points, so clock ticks
/// and view reads keep working while a request is outstanding.
pub async fn handle_click(
    session: &RefCell<GameSession>,
    validator: &dyn Validator,
    square: Square,
) -> ClickOutcome {
    let action = session.borrow_mut().click(square);
    match action {
        ClickAction::Ignored => ClickOutcome::Ignored,
        ClickAction::Refused(err) => ClickOutcome::Refused {
            reason: err.to_string(),
        },
        ClickAction::Deselected => ClickOutcome::Deselected,
        ClickAction::Query(query) => {
            let result = validator
                .legal_destinations(&query.position, query.square)
                .await;
            let mut session = session.borrow_mut();
            if session.resolve_query(&query, result) {
                ClickOutcome::Selected {
                    square: query.square,
                    destinations: session.destination_views(),
                }
            } else {
                ClickOutcome::NoDestinations
            }
        }
        ClickAction::Submit(request) => {
            let result = validator.submit_move(&request).await;
            match session.borrow_mut().settle_and_report(result) {
                Some((outcome, notices)) => ClickOutcome::Moved { outcome, notices },
                None => ClickOutcome::Ignored,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn mv(s: &str) -> MoveCandidate {
        s.parse().unwrap()
    }

    fn session() -> GameSession {
        GameSession::new(ClientConfig::default()).unwrap()
    }

    fn select(session: &mut GameSession, square: &str, moves: &[&str]) {
        let ClickAction::Query(query) = session.click(sq(square)) else {
            panic!("expected a query");
        };
        let moves = moves.iter().map(|m| mv(m)).collect();
        assert!(session.resolve_query(&query, Ok(moves)));
    }

    fn submit(session: &mut GameSession, dest: &str) -> SubmitMoveRequest {
        match session.click(sq(dest)) {
            ClickAction::Submit(request) => request,
            other => panic!("expected a submission, got {other:?}"),
        }
    }

    #[test]
    fn initial_state_is_correct() {
        let game = session();
        let view = game.view();
        assert_eq!(view.pieces.len(), 32);
        assert!(view.white_taken.is_empty());
        assert!(view.black_taken.is_empty());
        assert_eq!(view.active_side, Side::White);
        let clock = view.clock.unwrap();
        assert!(clock.running);
        assert_eq!(clock.white_remaining, 600);
        assert!(!view.is_thinking);
        assert_eq!(view.board_width, 560);
    }

    #[test]
    fn untimed_session_has_no_clock() {
        let mut game = GameSession::new(ClientConfig {
            initial_minutes: None,
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(game.clock_state(), None);
        assert_eq!(game.tick(), None);
    }

    #[test]
    fn submit_flips_clock_and_sets_gate() {
        let mut game = session();
        select(&mut game, "e2", &["e2e3", "e2e4"]);
        let request = submit(&mut game, "e4");

        assert_eq!(request.mv, mv("e2e4"));
        assert_eq!(request.depth, 2);
        assert!(game.is_thinking());
        assert_eq!(game.active_side(), Side::Black);
        assert_eq!(game.selection(), &SelectionState::Idle);

        game.tick();
        let clock = game.clock_state().unwrap();
        assert_eq!(clock.white_remaining, 600);
        assert_eq!(clock.black_remaining, 599);
    }

    #[test]
    fn clicks_ignored_while_thinking() {
        let mut game = session();
        select(&mut game, "e2", &["e2e4"]);
        submit(&mut game, "e4");
        assert_eq!(game.click(sq("d2")), ClickAction::Refused(ClientError::Busy));
        assert_eq!(game.click(sq("e4")), ClickAction::Refused(ClientError::Busy));
        assert!(game.is_thinking());
    }

    #[test]
    fn commit_updates_everything() {
        let mut game = session();
        select(&mut game, "e2", &["e2e4"]);
        submit(&mut game, "e4");
        let outcome = game
            .settle_move(Ok(SubmitMoveResponse {
                ok: true,
                fen: Some(AFTER_E4_E5.to_string()),
                engine_move: Some("e7e5".to_string()),
                ..SubmitMoveResponse::default()
            }))
            .unwrap();

        assert!(matches!(outcome, MoveOutcome::Committed { .. }));
        assert!(!game.is_thinking());
        assert_eq!(game.position().as_str(), AFTER_E4_E5);
        assert_eq!(game.active_side(), Side::White);
        assert_eq!(game.last_move(), &[mv("e2e4"), mv("e7e5")]);
        assert!(game.take_notices().is_empty());
    }

    #[test]
    fn rejection_restores_prior_side_and_notifies() {
        let mut game = session();
        select(&mut game, "e2", &["e2e4"]);
        submit(&mut game, "e4");
        game.settle_move(Ok(SubmitMoveResponse {
            ok: false,
            error: Some("illegal move".to_string()),
            ..SubmitMoveResponse::default()
        }));

        assert_eq!(game.board(), &BoardState::standard());
        assert_eq!(game.active_side(), Side::White);
        assert!(!game.is_thinking());
        let notices = game.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Rejected);
        assert!(notices[0].message.contains("illegal move"));
    }

    #[test]
    fn transport_failure_restores_side_from_position() {
        let mut game = session();
        select(&mut game, "e2", &["e2e4"]);
        submit(&mut game, "e4");
        game.settle_move(Err(ClientError::Transport {
            message: "timed out".to_string(),
        }));

        assert_eq!(game.board(), &BoardState::standard());
        assert_eq!(game.active_side(), Side::White);
        assert_eq!(game.take_notices()[0].kind, NoticeKind::Connectivity);
    }

    #[test]
    fn checkmate_without_reply_stops_clock() {
        let mut game = session();
        select(&mut game, "e2", &["e2e4"]);
        submit(&mut game, "e4");
        // Black to move, but the game is over: the opponent must not be charged.
        game.settle_move(Ok(SubmitMoveResponse {
            ok: true,
            fen: Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()),
            game_over: true,
            winner: Some(crate::types::Winner::White),
            reason: Some("checkmate".to_string()),
            ..SubmitMoveResponse::default()
        }));

        assert!(game.is_game_over());
        let before = game.clock_state().unwrap();
        assert!(!before.running);
        game.tick();
        assert_eq!(game.clock_state().unwrap(), before);
        assert_eq!(game.click(sq("d7")), ClickAction::Refused(ClientError::GameOver));
        assert_eq!(game.take_notices()[0].kind, NoticeKind::GameOver);
    }

    #[test]
    fn timeout_ends_game_even_while_thinking() {
        let mut game = GameSession::new(ClientConfig {
            initial_minutes: Some(1),
            ..ClientConfig::default()
        })
        .unwrap();
        let outcome = (0..60).find_map(|_| game.tick()).unwrap();
        assert_eq!(outcome, GameOutcome::timeout(Side::White));
        assert!(game.is_game_over());
        assert!(!game.clock_state().unwrap().running);
    }

    #[test]
    fn stale_query_is_discarded() {
        let mut game = session();
        let ClickAction::Query(first) = game.click(sq("e2")) else {
            panic!("expected a query");
        };
        let ClickAction::Query(second) = game.click(sq("d2")) else {
            panic!("expected a query");
        };
        assert!(!game.resolve_query(&first, Ok(vec![mv("e2e4")])));
        assert!(game.resolve_query(&second, Ok(vec![mv("d2d4")])));
        assert_eq!(game.selection().selected_square(), Some(sq("d2")));
    }

    #[test]
    fn failed_query_stays_idle() {
        let mut game = session();
        let ClickAction::Query(query) = game.click(sq("e2")) else {
            panic!("expected a query");
        };
        let err = ClientError::Transport {
            message: "down".to_string(),
        };
        assert!(!game.resolve_query(&query, Err(err)));
        assert_eq!(game.selection(), &SelectionState::Idle);
        assert!(game.take_notices().is_empty());
    }

    #[test]
    fn destination_views_flag_captures() {
        let fen = "4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1";
        let mut game = GameSession::new(ClientConfig {
            start_position: fen.to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        select(&mut game, "e4", &["e4e5", "e4d5"]);
        let views = game.destination_views();
        assert_eq!(
            views,
            vec![
                DestinationView {
                    square: sq("d5"),
                    capture: true
                },
                DestinationView {
                    square: sq("e5"),
                    capture: false
                },
            ]
        );
    }

    #[test]
    fn reset_recomputes_from_scratch() {
        let mut game = session();
        select(&mut game, "e2", &["e2e4"]);
        submit(&mut game, "e4");
        let resync = Position::parse("4k3/8/8/8/8/8/8/4K3 b - - 0 50").unwrap();
        game.reset(resync);

        assert!(!game.is_thinking());
        assert_eq!(game.active_side(), Side::Black);
        assert_eq!(game.captured().white_taken.len(), 15);
        assert_eq!(game.captured().black_taken.len(), 15);
        assert_eq!(game.settle_move(Ok(SubmitMoveResponse::default())), None);
    }
}
