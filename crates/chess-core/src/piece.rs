//! Piece kinds.

use crate::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six kinds of chess pieces.
///
/// Kind and side are kept apart; a concrete piece on the board is a
/// `(Piece, Color)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Piece {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl Piece {
    /// All piece kinds in index order.
    pub const ALL: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    /// Kinds a pawn may promote to, strongest first.
    pub const PROMOTIONS: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

    /// Returns the array index of this kind (0-5).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase letter shared by FEN and UCI promotion suffixes.
    const fn letter(self) -> char {
        match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        }
    }

    fn from_letter(c: char) -> Option<Piece> {
        Piece::ALL
            .into_iter()
            .find(|p| p.letter() == c.to_ascii_lowercase())
    }

    /// FEN character: uppercase for White, lowercase for Black.
    pub const fn to_fen_char(self, color: Color) -> char {
        match color {
            Color::White => self.letter().to_ascii_uppercase(),
            Color::Black => self.letter(),
        }
    }

    /// Parses a FEN placement character into kind and side.
    pub fn from_fen_char(c: char) -> Option<(Piece, Color)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Piece::from_letter(c).map(|p| (p, color))
    }

    /// Uppercase letter used in SAN (`None` for pawns).
    pub const fn san_char(self) -> Option<char> {
        match self {
            Piece::Pawn => None,
            other => Some(other.letter().to_ascii_uppercase()),
        }
    }

    /// Parses an uppercase SAN piece letter (pawns have none).
    pub fn from_san_char(c: char) -> Option<Piece> {
        if !c.is_ascii_uppercase() || c == 'P' {
            return None;
        }
        Piece::from_letter(c)
    }

    /// Lowercase suffix used by UCI for promotions (`e7e8q`).
    pub const fn promotion_char(self) -> char {
        self.letter()
    }

    /// Parses a promotion suffix; only knight, bishop, rook and queen qualify.
    pub fn from_promotion_char(c: char) -> Option<Piece> {
        Piece::from_letter(c).filter(|p| Piece::PROMOTIONS.contains(p))
    }

    /// Returns true for bishop, rook and queen.
    #[inline]
    pub const fn is_slider(self) -> bool {
        matches!(self, Piece::Bishop | Piece::Rook | Piece::Queen)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Piece::Pawn => "Pawn",
            Piece::Knight => "Knight",
            Piece::Bishop => "Bishop",
            Piece::Rook => "Rook",
            Piece::Queen => "Queen",
            Piece::King => "King",
        };
        f.write_str(name)
    }
}
