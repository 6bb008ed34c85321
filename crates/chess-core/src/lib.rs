//! Core value types for chess.
//!
//! This crate provides the small immutable types shared by the rules crate,
//! the UCI wire crate and the arbiter:
//! - [`Piece`] and [`Color`] for piece representation
//! - [`Square`], [`File`], and [`Rank`] for board coordinates
//! - [`Move`], [`MoveFlag`] and [`MoveKind`] for move representation
//! - [`FenFields`] for splitting and validating FEN strings

mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use color::Color;
pub use fen::{FenError, FenFields};
pub use mov::{Move, MoveFlag, MoveKind};
pub use piece::Piece;
pub use square::{File, Rank, Square};
