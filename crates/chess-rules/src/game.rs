//! The game state machine.
//!
//! [`Game`] owns the current [`Board`] and an append-only record of every
//! move played. After each move the position is classified in a fixed
//! order: checkmate, stalemate, fifty-move rule, threefold repetition,
//! insufficient material.

use crate::movegen::{legal_moves, resolve_uci};
use crate::san::{move_to_san, san_to_move, SanError};
use crate::state::GameState;
use crate::{Board, BoardError, MoveList, Signature};
use chess_core::{Color, Move};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("game is over: {0}")]
    GameOver(GameState),

    #[error("invalid SAN: {0}")]
    InvalidSan(#[from] SanError),

    #[error("no move to undo")]
    NothingToUndo,
}

/// Whether a move leaves the opponent in check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    None,
    Check,
    Checkmate,
}

/// One played move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Position the move was played from.
    pub board_before: Board,
    pub mov: Move,
    pub san: String,
    pub check: CheckStatus,
    /// Signature of the position the move produced.
    pub signature_after: Signature,
}

/// A chess game from a start position to its current state.
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    start: Board,
    record: Vec<RecordEntry>,
    state: GameState,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// A game from the standard start position.
    pub fn new() -> Self {
        Self::from_board(Board::startpos())
    }

    /// A game from an arbitrary position; it may already be over.
    pub fn from_board(board: Board) -> Self {
        let mut game = Game {
            start: board.clone(),
            board,
            record: Vec::new(),
            state: GameState::InProgress,
        };
        game.state = game.classify();
        game
    }

    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        Ok(Self::from_board(Board::from_fen(fen)?))
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn start_board(&self) -> &Board {
        &self.start
    }

    #[inline]
    pub fn state(&self) -> GameState {
        self.state
    }

    #[inline]
    pub fn record(&self) -> &[RecordEntry] {
        &self.record
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn legal_moves(&self) -> MoveList {
        if self.state.is_terminal() {
            return MoveList::new();
        }
        legal_moves(&self.board)
    }

    pub fn is_check(&self) -> bool {
        self.board.is_check()
    }

    /// How often the current position has occurred, counting the start.
    pub fn repetition_count(&self) -> usize {
        let current = self.board.signature();
        let earlier = self
            .record
            .iter()
            .filter(|entry| entry.signature_after == current)
            .count();
        earlier + usize::from(self.start.signature() == current)
    }

    /// Moves played so far in coordinate notation.
    pub fn uci_moves(&self) -> Vec<String> {
        self.record.iter().map(|entry| entry.mov.to_uci()).collect()
    }

    /// Plays a move, which must be one of the current legal moves.
    ///
    /// On error the game is left untouched.
    pub fn submit_move(&mut self, m: Move) -> Result<GameState, GameError> {
        self.ensure_in_progress()?;
        if !legal_moves(&self.board).contains(m) {
            return Err(GameError::IllegalMove(m.to_uci()));
        }
        let next = self
            .board
            .apply(m)
            .map_err(|_| GameError::IllegalMove(m.to_uci()))?;

        let san = move_to_san(&self.board, m);
        let check = if !next.is_check() {
            CheckStatus::None
        } else if legal_moves(&next).is_empty() {
            CheckStatus::Checkmate
        } else {
            CheckStatus::Check
        };
        let board_before = std::mem::replace(&mut self.board, next);
        self.record.push(RecordEntry {
            board_before,
            mov: m,
            san,
            check,
            signature_after: self.board.signature(),
        });
        self.state = self.classify();
        Ok(self.state)
    }

    /// Plays a move given in coordinate notation (`e2e4`, `e7e8q`).
    pub fn submit_uci(&mut self, text: &str) -> Result<GameState, GameError> {
        self.ensure_in_progress()?;
        let m = resolve_uci(&self.board, text)
            .ok_or_else(|| GameError::IllegalMove(text.trim().to_string()))?;
        self.submit_move(m)
    }

    /// Plays a move given in SAN (`Nf3`, `O-O`).
    pub fn submit_san(&mut self, text: &str) -> Result<GameState, GameError> {
        self.ensure_in_progress()?;
        let m = san_to_move(&self.board, text)?;
        self.submit_move(m)
    }

    /// Interprets `text` as coordinate notation if it has that shape,
    /// otherwise as SAN, and returns the matching legal move.
    pub fn parse_move(&self, text: &str) -> Result<Move, GameError> {
        let text = text.trim();
        if Move::from_uci(text).is_some() {
            return resolve_uci(&self.board, text)
                .ok_or_else(|| GameError::IllegalMove(text.to_string()));
        }
        Ok(san_to_move(&self.board, text)?)
    }

    /// The named side gives up.
    pub fn resign(&mut self, loser: Color) -> Result<GameState, GameError> {
        self.ensure_in_progress()?;
        self.state = GameState::Resigned(loser);
        Ok(self.state)
    }

    /// The named side ran out of time.
    pub fn forfeit_on_time(&mut self, loser: Color) -> Result<GameState, GameError> {
        self.ensure_in_progress()?;
        self.state = GameState::TimeForfeit(loser);
        Ok(self.state)
    }

    /// Takes back the last move and returns it.
    ///
    /// Resignations and time forfeits are final.
    pub fn undo(&mut self) -> Result<Move, GameError> {
        if matches!(self.state, GameState::Resigned(_) | GameState::TimeForfeit(_)) {
            return Err(GameError::GameOver(self.state));
        }
        let entry = self.record.pop().ok_or(GameError::NothingToUndo)?;
        self.board = entry.board_before;
        self.state = self.classify();
        Ok(entry.mov)
    }

    fn ensure_in_progress(&self) -> Result<(), GameError> {
        if self.state.is_terminal() {
            Err(GameError::GameOver(self.state))
        } else {
            Ok(())
        }
    }

    fn classify(&self) -> GameState {
        if legal_moves(&self.board).is_empty() {
            return if !self.board.is_check() {
                GameState::StalemateDraw
            } else if self.board.side_to_move() == Color::White {
                GameState::CheckmateBlackWins
            } else {
                GameState::CheckmateWhiteWins
            };
        }
        if self.board.halfmove_clock() >= 100 {
            GameState::FiftyMoveDraw
        } else if self.repetition_count() >= 3 {
            GameState::ThreefoldRepetitionDraw
        } else if self.board.is_insufficient_material() {
            GameState::InsufficientMaterialDraw
        } else {
            GameState::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameResult;

    fn play(game: &mut Game, moves: &[&str]) {
        for text in moves {
            game.submit_san(text).unwrap();
        }
    }

    #[test]
    fn new_game() {
        let game = Game::new();
        assert_eq!(game.state(), GameState::InProgress);
        assert!(game.record().is_empty());
        assert_eq!(game.legal_moves().len(), 20);
        assert_eq!(game.repetition_count(), 1);
    }

    #[test]
    fn record_keeps_san_and_board_before() {
        let mut game = Game::new();
        game.submit_uci("e2e4").unwrap();
        game.submit_san("e5").unwrap();
        let record = game.record();
        assert_eq!(record.len(), 2);
        assert_eq!(record[0].san, "e4");
        assert_eq!(record[0].board_before, Board::startpos());
        assert_eq!(record[1].signature_after, game.board().signature());
        assert_eq!(game.uci_moves(), vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn illegal_move_is_rejected_without_side_effects() {
        let mut game = Game::new();
        assert_eq!(
            game.submit_uci("e2e5"),
            Err(GameError::IllegalMove("e2e5".to_string()))
        );
        let unflagged = Move::from_uci("e2e4").unwrap();
        assert!(matches!(game.submit_move(unflagged), Err(GameError::IllegalMove(_))));
        assert!(game.record().is_empty());
        assert_eq!(game.board(), &Board::startpos());
    }

    #[test]
    fn check_status_is_recorded() {
        let mut game = Game::new();
        play(&mut game, &["e4", "f5", "Qh5+"]);
        assert_eq!(game.record()[2].check, CheckStatus::Check);
        assert_eq!(game.record()[2].san, "Qh5+");
        assert!(game.is_check());
    }

    #[test]
    fn stalemate_from_fen() {
        let game = Game::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(game.state(), GameState::StalemateDraw);
        assert!(game.legal_moves().is_empty());
    }

    #[test]
    fn fifty_move_rule() {
        let mut game = Game::from_fen("7k/8/8/8/8/8/8/R3K3 w - - 99 80").unwrap();
        assert_eq!(game.state(), GameState::InProgress);
        game.submit_uci("a1a2").unwrap();
        assert_eq!(game.state(), GameState::FiftyMoveDraw);
        assert_eq!(game.state().result(), Some(GameResult::Draw));
    }

    #[test]
    fn checkmate_outranks_fifty_move_rule() {
        let mut game = Game::from_fen("6k1/5ppp/8/8/8/8/8/R3K3 w - - 99 80").unwrap();
        game.submit_uci("a1a8").unwrap();
        assert_eq!(game.state(), GameState::CheckmateWhiteWins);
        assert_eq!(game.record()[0].check, CheckStatus::Checkmate);
    }

    #[test]
    fn insufficient_material_after_capture() {
        let mut game = Game::from_fen("7k/8/8/8/8/8/5r2/4K3 w - - 0 1").unwrap();
        game.submit_uci("e1f2").unwrap();
        assert_eq!(game.state(), GameState::InsufficientMaterialDraw);
    }

    #[test]
    fn resign_and_forfeit() {
        let mut game = Game::new();
        assert_eq!(game.resign(Color::White), Ok(GameState::Resigned(Color::White)));
        assert_eq!(game.state().result(), Some(GameResult::BlackWins));
        assert!(matches!(game.forfeit_on_time(Color::Black), Err(GameError::GameOver(_))));
        assert!(matches!(game.undo(), Err(GameError::GameOver(_))));

        let mut game = Game::new();
        game.forfeit_on_time(Color::Black).unwrap();
        assert_eq!(game.state().result(), Some(GameResult::WhiteWins));
        assert!(game.legal_moves().is_empty());
    }

    #[test]
    fn undo_restores_previous_position() {
        let mut game = Game::new();
        assert_eq!(game.undo(), Err(GameError::NothingToUndo));
        play(&mut game, &["f3", "e5", "g4", "Qh4#"]);
        assert_eq!(game.state(), GameState::CheckmateBlackWins);

        let taken_back = game.undo().unwrap();
        assert_eq!(taken_back.to_uci(), "d8h4");
        assert_eq!(game.state(), GameState::InProgress);
        assert_eq!(game.record().len(), 3);
        assert_eq!(game.side_to_move(), Color::Black);
    }

    #[test]
    fn parse_move_accepts_both_notations() {
        let game = Game::new();
        assert_eq!(game.parse_move("g1f3").unwrap().to_uci(), "g1f3");
        assert_eq!(game.parse_move(" Nf3 ").unwrap().to_uci(), "g1f3");
        assert_eq!(
            game.parse_move("e2e5"),
            Err(GameError::IllegalMove("e2e5".to_string()))
        );
        assert!(matches!(game.parse_move("Qh5"), Err(GameError::InvalidSan(_))));
    }
}
