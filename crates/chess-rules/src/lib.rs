//! Chess rules: board model, legal move generation and the game state machine.
//!
//! This crate provides:
//! - [`Board`] - piece placement, side to move, castling rights, en-passant
//!   target and clocks, built from and written back to FEN
//! - [`legal_moves`] - the legality filter over pseudo-legal generation
//! - [`Game`] - an append-only move record with automatic detection of
//!   checkmate, stalemate, the fifty-move rule, threefold repetition and
//!   insufficient material
//! - SAN formatting and parsing
//!
//! # Example
//!
//! ```
//! use chess_rules::{Game, GameState};
//!
//! let mut game = Game::new();
//! for san in ["f3", "e5", "g4", "Qh4#"] {
//!     game.submit_san(san).unwrap();
//! }
//! assert_eq!(game.state(), GameState::CheckmateBlackWins);
//! ```

mod bitboard;
mod board;
mod game;
pub mod movegen;
pub mod san;
mod state;

pub use bitboard::Bitboard;
pub use board::{Board, BoardError, CastlingRights, Signature};
pub use game::{CheckStatus, Game, GameError, RecordEntry};
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{
    destinations, is_legal, legal_moves, pseudo_legal_moves, resolve_uci, MoveList,
};
pub use san::{move_to_san, san_to_move, SanError};
pub use state::{GameResult, GameState};
