//! Move representation.

use crate::{Piece, Square};
use std::fmt;

/// Encoding tag stored in the top four bits of a [`Move`].
///
/// Finer grained than [`MoveKind`]: it also records pawn double steps and
/// whether a promotion captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    Quiet = 0,
    DoublePush = 1,
    CastleKingside = 2,
    CastleQueenside = 3,
    Capture = 4,
    EnPassant = 5,
    PromoteKnight = 6,
    PromoteBishop = 7,
    PromoteRook = 8,
    PromoteQueen = 9,
    PromoteCaptureKnight = 10,
    PromoteCaptureBishop = 11,
    PromoteCaptureRook = 12,
    PromoteCaptureQueen = 13,
}

impl MoveFlag {
    const ALL: [MoveFlag; 14] = [
        MoveFlag::Quiet,
        MoveFlag::DoublePush,
        MoveFlag::CastleKingside,
        MoveFlag::CastleQueenside,
        MoveFlag::Capture,
        MoveFlag::EnPassant,
        MoveFlag::PromoteKnight,
        MoveFlag::PromoteBishop,
        MoveFlag::PromoteRook,
        MoveFlag::PromoteQueen,
        MoveFlag::PromoteCaptureKnight,
        MoveFlag::PromoteCaptureBishop,
        MoveFlag::PromoteCaptureRook,
        MoveFlag::PromoteCaptureQueen,
    ];

    /// The promotion flag for `piece`, capturing or not.
    ///
    /// Returns `None` for pawns and kings.
    pub const fn promotion(piece: Piece, capture: bool) -> Option<Self> {
        let base = match piece {
            Piece::Knight => 6,
            Piece::Bishop => 7,
            Piece::Rook => 8,
            Piece::Queen => 9,
            Piece::Pawn | Piece::King => return None,
        };
        let offset = if capture { 4 } else { 0 };
        Some(Self::ALL[base + offset])
    }

    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        match self {
            MoveFlag::PromoteKnight | MoveFlag::PromoteCaptureKnight => Some(Piece::Knight),
            MoveFlag::PromoteBishop | MoveFlag::PromoteCaptureBishop => Some(Piece::Bishop),
            MoveFlag::PromoteRook | MoveFlag::PromoteCaptureRook => Some(Piece::Rook),
            MoveFlag::PromoteQueen | MoveFlag::PromoteCaptureQueen => Some(Piece::Queen),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self.promotion_piece().is_some()
    }

    /// True when a piece is removed from the board, en passant included.
    #[inline]
    pub const fn is_capture(self) -> bool {
        matches!(
            self,
            MoveFlag::Capture
                | MoveFlag::EnPassant
                | MoveFlag::PromoteCaptureKnight
                | MoveFlag::PromoteCaptureBishop
                | MoveFlag::PromoteCaptureRook
                | MoveFlag::PromoteCaptureQueen
        )
    }

    #[inline]
    pub const fn is_castling(self) -> bool {
        matches!(self, MoveFlag::CastleKingside | MoveFlag::CastleQueenside)
    }

    /// Collapses the encoding tag into the public move kind.
    pub const fn kind(self) -> MoveKind {
        match self {
            MoveFlag::Quiet | MoveFlag::DoublePush => MoveKind::Normal,
            MoveFlag::Capture => MoveKind::Capture,
            MoveFlag::CastleKingside => MoveKind::CastleKingside,
            MoveFlag::CastleQueenside => MoveKind::CastleQueenside,
            MoveFlag::EnPassant => MoveKind::EnPassant,
            _ => MoveKind::Promotion,
        }
    }
}

/// What a move does, as seen by callers.
///
/// A capturing promotion is reported as `Promotion`; use
/// [`Move::is_capture`] to tell it apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Normal,
    Capture,
    CastleKingside,
    CastleQueenside,
    EnPassant,
    Promotion,
}

/// A chess move packed into 16 bits: source (6), destination (6), flag (4).
///
/// Castling is encoded as the king's two-square move (`e1g1`, `e8c8`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u16);

impl Move {
    /// Placeholder value; never a legal move. Written as `0000` in UCI.
    pub const NULL: Move = Move(0);

    #[inline]
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Self {
        Move((from.index() as u16) | ((to.index() as u16) << 6) | ((flag as u16) << 12))
    }

    /// A non-capturing move with no special effect.
    #[inline]
    pub const fn quiet(from: Square, to: Square) -> Self {
        Self::new(from, to, MoveFlag::Quiet)
    }

    #[inline]
    pub const fn from(self) -> Square {
        match Square::from_index((self.0 & 0x3F) as u8) {
            Some(sq) => sq,
            None => Square::A1,
        }
    }

    #[inline]
    pub const fn to(self) -> Square {
        match Square::from_index(((self.0 >> 6) & 0x3F) as u8) {
            Some(sq) => sq,
            None => Square::A1,
        }
    }

    #[inline]
    pub const fn flag(self) -> MoveFlag {
        let raw = (self.0 >> 12) as usize;
        if raw < MoveFlag::ALL.len() {
            MoveFlag::ALL[raw]
        } else {
            MoveFlag::Quiet
        }
    }

    #[inline]
    pub const fn kind(self) -> MoveKind {
        self.flag().kind()
    }

    #[inline]
    pub const fn promotion(self) -> Option<Piece> {
        self.flag().promotion_piece()
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        self.flag().is_capture()
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Coordinate notation: `e2e4`, `e7e8q`, `0000` for the null move.
    pub fn to_uci(self) -> String {
        if self.is_null() {
            return "0000".to_string();
        }
        match self.promotion() {
            Some(piece) => format!("{}{}{}", self.from(), self.to(), piece.promotion_char()),
            None => format!("{}{}", self.from(), self.to()),
        }
    }

    /// Parses coordinate notation.
    ///
    /// The result only carries source, destination and promotion piece; the
    /// remaining flags depend on the board and are filled in by matching the
    /// result against generated moves.
    pub fn from_uci(s: &str) -> Option<Self> {
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let flag = match s[4..].chars().next() {
            Some(c) => MoveFlag::promotion(Piece::from_promotion_char(c)?, false)?,
            None => MoveFlag::Quiet,
        };
        Some(Move::new(from, to, flag))
    }

    /// True when both moves name the same squares and promotion piece.
    #[inline]
    pub fn same_coordinates(self, other: Move) -> bool {
        self.from() == other.from() && self.to() == other.to() && self.promotion() == other.promotion()
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({} {:?})", self.to_uci(), self.flag())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    #[test]
    fn packs_squares_and_flag() {
        let m = Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePush);
        assert_eq!(m.from(), sq("e2"));
        assert_eq!(m.to(), sq("e4"));
        assert_eq!(m.flag(), MoveFlag::DoublePush);
        assert_eq!(m.kind(), MoveKind::Normal);
    }

    #[test]
    fn every_flag_survives_packing() {
        for flag in MoveFlag::ALL {
            let m = Move::new(sq("h7"), sq("g8"), flag);
            assert_eq!(m.flag(), flag);
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(MoveFlag::Capture.kind(), MoveKind::Capture);
        assert_eq!(MoveFlag::EnPassant.kind(), MoveKind::EnPassant);
        assert_eq!(MoveFlag::CastleKingside.kind(), MoveKind::CastleKingside);
        assert_eq!(MoveFlag::CastleQueenside.kind(), MoveKind::CastleQueenside);
        assert_eq!(MoveFlag::PromoteCaptureRook.kind(), MoveKind::Promotion);
        assert!(MoveFlag::PromoteCaptureRook.is_capture());
        assert!(!MoveFlag::PromoteRook.is_capture());
        assert!(MoveFlag::EnPassant.is_capture());
    }

    #[test]
    fn promotion_flags() {
        assert_eq!(
            MoveFlag::promotion(Piece::Queen, false),
            Some(MoveFlag::PromoteQueen)
        );
        assert_eq!(
            MoveFlag::promotion(Piece::Knight, true),
            Some(MoveFlag::PromoteCaptureKnight)
        );
        assert_eq!(MoveFlag::promotion(Piece::King, false), None);
        for piece in Piece::PROMOTIONS {
            for capture in [false, true] {
                let flag = MoveFlag::promotion(piece, capture).unwrap();
                assert_eq!(flag.promotion_piece(), Some(piece));
                assert_eq!(flag.is_capture(), capture);
            }
        }
    }

    #[test]
    fn uci_output() {
        assert_eq!(Move::quiet(sq("g1"), sq("f3")).to_uci(), "g1f3");
        let promo = Move::new(sq("b7"), sq("a8"), MoveFlag::PromoteCaptureKnight);
        assert_eq!(promo.to_uci(), "b7a8n");
        assert_eq!(Move::NULL.to_uci(), "0000");
        assert_eq!(Move::quiet(sq("e2"), sq("e4")).to_string(), "e2e4");
    }

    #[test]
    fn uci_parsing() {
        let m = Move::from_uci("e2e4").unwrap();
        assert_eq!((m.from(), m.to()), (sq("e2"), sq("e4")));
        assert_eq!(m.promotion(), None);

        assert_eq!(Move::from_uci("e7e8q").unwrap().promotion(), Some(Piece::Queen));
        assert_eq!(Move::from_uci("a2a1N").unwrap().promotion(), Some(Piece::Knight));

        assert!(Move::from_uci("e7e8k").is_none());
        assert!(Move::from_uci("e2").is_none());
        assert!(Move::from_uci("e2e4qq").is_none());
        assert!(Move::from_uci("e2e9").is_none());
        assert!(Move::from_uci("é2e4").is_none());
    }

    #[test]
    fn coordinate_comparison_ignores_flags() {
        let parsed = Move::from_uci("d7c8q").unwrap();
        let generated = Move::new(sq("d7"), sq("c8"), MoveFlag::PromoteCaptureQueen);
        assert!(parsed.same_coordinates(generated));
        assert_ne!(parsed, generated);
        assert!(!parsed.same_coordinates(Move::new(sq("d7"), sq("c8"), MoveFlag::PromoteCaptureRook)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn packing_keeps_every_field(from in 0u8..64, to in 0u8..64, flag in 0usize..14) {
                let (from, to) = (Square::from_index(from).unwrap(), Square::from_index(to).unwrap());
                let m = Move::new(from, to, MoveFlag::ALL[flag]);
                prop_assert_eq!(m.from(), from);
                prop_assert_eq!(m.to(), to);
                prop_assert_eq!(m.flag(), MoveFlag::ALL[flag]);
            }

            #[test]
            fn uci_text_names_the_same_coordinates(from in 0u8..64, to in 0u8..64, flag in 0usize..14) {
                prop_assume!(from != to);
                let m = Move::new(
                    Square::from_index(from).unwrap(),
                    Square::from_index(to).unwrap(),
                    MoveFlag::ALL[flag],
                );
                let parsed = Move::from_uci(&m.to_uci()).unwrap();
                prop_assert!(parsed.same_coordinates(m));
            }
        }
    }
}
