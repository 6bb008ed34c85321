//! Game lifecycle states and outcomes.

use chess_core::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    /// The result token used in PGN (`1-0`, `0-1`, `1/2-1/2`).
    pub const fn pgn_token(self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }

    pub const fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }

    pub const fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWins => Some(Color::White),
            GameResult::BlackWins => Some(Color::Black),
            GameResult::Draw => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pgn_token())
    }
}

/// Where a game stands. Every state except `InProgress` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    InProgress,
    CheckmateWhiteWins,
    CheckmateBlackWins,
    StalemateDraw,
    FiftyMoveDraw,
    ThreefoldRepetitionDraw,
    InsufficientMaterialDraw,
    /// The named side resigned.
    Resigned(Color),
    /// The named side ran out of time.
    TimeForfeit(Color),
}

impl GameState {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, GameState::InProgress)
    }

    /// The outcome, or `None` while the game is still running.
    pub const fn result(self) -> Option<GameResult> {
        match self {
            GameState::InProgress => None,
            GameState::CheckmateWhiteWins => Some(GameResult::WhiteWins),
            GameState::CheckmateBlackWins => Some(GameResult::BlackWins),
            GameState::StalemateDraw
            | GameState::FiftyMoveDraw
            | GameState::ThreefoldRepetitionDraw
            | GameState::InsufficientMaterialDraw => Some(GameResult::Draw),
            GameState::Resigned(loser) | GameState::TimeForfeit(loser) => {
                Some(GameResult::win_for(loser.opposite()))
            }
        }
    }

    /// True for terminal states that follow from the board alone, as opposed
    /// to a resignation or a flag fall.
    pub const fn is_board_derived(self) -> bool {
        !matches!(
            self,
            GameState::InProgress | GameState::Resigned(_) | GameState::TimeForfeit(_)
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::InProgress => f.write_str("in progress"),
            GameState::CheckmateWhiteWins => f.write_str("White wins by checkmate"),
            GameState::CheckmateBlackWins => f.write_str("Black wins by checkmate"),
            GameState::StalemateDraw => f.write_str("draw by stalemate"),
            GameState::FiftyMoveDraw => f.write_str("draw by the fifty-move rule"),
            GameState::ThreefoldRepetitionDraw => f.write_str("draw by threefold repetition"),
            GameState::InsufficientMaterialDraw => f.write_str("draw by insufficient material"),
            GameState::Resigned(loser) => write!(f, "{loser} resigned"),
            GameState::TimeForfeit(loser) => write!(f, "{loser} lost on time"),
        }
    }
}
