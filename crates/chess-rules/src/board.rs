//! Board model: placement, side to move, castling, en passant and clocks.

use chess_core::{Color, FenError, FenFields, Move, Piece, Square};
use thiserror::Error;

use crate::movegen::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks,
};
use crate::Bitboard;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// The move does not start from a piece of the side to move.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error(transparent)]
    Fen(#[from] FenError),

    /// Well-formed FEN describing a position that cannot occur.
    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

/// The four castling permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    const fn bit(color: Color, kingside: bool) -> u8 {
        match (color, kingside) {
            (Color::White, true) => 0b0001,
            (Color::White, false) => 0b0010,
            (Color::Black, true) => 0b0100,
            (Color::Black, false) => 0b1000,
        }
    }

    #[inline]
    pub const fn has(self, color: Color, kingside: bool) -> bool {
        self.0 & Self::bit(color, kingside) != 0
    }

    #[inline]
    pub const fn kingside(self, color: Color) -> bool {
        self.has(color, true)
    }

    #[inline]
    pub const fn queenside(self, color: Color) -> bool {
        self.has(color, false)
    }

    #[inline]
    pub fn grant(&mut self, color: Color, kingside: bool) {
        self.0 |= Self::bit(color, kingside);
    }

    #[inline]
    pub fn revoke(&mut self, color: Color, kingside: bool) {
        self.0 &= !Self::bit(color, kingside);
    }

    #[inline]
    pub fn revoke_all(&mut self, color: Color) {
        self.revoke(color, true);
        self.revoke(color, false);
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// FEN castling field letters (`KQkq` order), `-` when empty.
    pub fn to_fen(self) -> String {
        if self.is_empty() {
            return "-".to_string();
        }
        [
            ('K', Color::White, true),
            ('Q', Color::White, false),
            ('k', Color::Black, true),
            ('q', Color::Black, false),
        ]
        .into_iter()
        .filter(|(_, color, kingside)| self.has(*color, *kingside))
        .map(|(c, _, _)| c)
        .collect()
    }
}

/// Home squares of king and rooks for one castling side.
pub(crate) struct CastlingPath {
    pub king_from: Square,
    pub king_to: Square,
    pub rook_from: Square,
    pub rook_to: Square,
    /// Squares that must be empty.
    pub between: Bitboard,
    /// Square the king crosses on its way.
    pub transit: Square,
}

pub(crate) fn castling_path(color: Color, kingside: bool) -> CastlingPath {
    let rank = color.back_rank() as i8;
    let at = |file: i8| Square::from_coords(file, rank).unwrap_or(Square::A1);
    if kingside {
        CastlingPath {
            king_from: at(4),
            king_to: at(6),
            rook_from: at(7),
            rook_to: at(5),
            between: Bitboard::from_squares(&[at(5), at(6)]),
            transit: at(5),
        }
    } else {
        CastlingPath {
            king_from: at(4),
            king_to: at(2),
            rook_from: at(0),
            rook_to: at(3),
            between: Bitboard::from_squares(&[at(1), at(2), at(3)]),
            transit: at(3),
        }
    }
}

/// Canonical key for repetition: placement, side to move, castling rights
/// and en-passant target, compared exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    pieces: [Bitboard; 6],
    colors: [Bitboard; 2],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
}

/// A complete chess position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub(crate) pieces: [Bitboard; 6],
    pub(crate) colors: [Bitboard; 2],
    pub(crate) side_to_move: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
}

impl Board {
    pub fn startpos() -> Self {
        Self::from_fields(&FenFields::default())
    }

    /// Parses and validates a FEN string.
    ///
    /// Castling rights whose king or rook is off its home square are dropped.
    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        let fields = FenFields::parse(fen)?;
        let mut board = Self::from_fields(&fields);
        board.validate()?;
        for color in Color::BOTH {
            for kingside in [true, false] {
                let path = castling_path(color, kingside);
                let intact = board.piece_at(path.king_from) == Some((Piece::King, color))
                    && board.piece_at(path.rook_from) == Some((Piece::Rook, color));
                if !intact {
                    board.castling.revoke(color, kingside);
                }
            }
        }
        Ok(board)
    }

    fn from_fields(fields: &FenFields) -> Self {
        let mut board = Board {
            pieces: [Bitboard::EMPTY; 6],
            colors: [Bitboard::EMPTY; 2],
            side_to_move: fields.side_to_move,
            castling: CastlingRights::NONE,
            en_passant: fields.en_passant,
            halfmove_clock: fields.halfmove_clock,
            fullmove_number: fields.fullmove_number,
        };
        for sq in Square::all() {
            if let Some((piece, color)) = fields.placement[sq.index() as usize] {
                board.put(sq, piece, color);
            }
        }
        for c in fields.castling.chars() {
            match c {
                'K' => board.castling.grant(Color::White, true),
                'Q' => board.castling.grant(Color::White, false),
                'k' => board.castling.grant(Color::Black, true),
                'q' => board.castling.grant(Color::Black, false),
                _ => {}
            }
        }
        board
    }

    fn validate(&self) -> Result<(), BoardError> {
        for color in Color::BOTH {
            let kings = self.pieces_of(Piece::King, color).count();
            if kings != 1 {
                return Err(BoardError::InvalidPosition(format!(
                    "{color} has {kings} kings"
                )));
            }
        }
        if (self.pieces[Piece::Pawn.index()] & (Bitboard::RANK_1 | Bitboard::RANK_8)).is_not_empty() {
            return Err(BoardError::InvalidPosition(
                "pawn on the first or last rank".to_string(),
            ));
        }
        let waiting = self.side_to_move.opposite();
        if self.is_in_check(waiting) {
            return Err(BoardError::InvalidPosition(format!(
                "{waiting} is in check but not to move"
            )));
        }
        if let Some(target) = self.en_passant {
            let mover = self.side_to_move;
            let pushed = target.offset(0, -mover.pawn_direction());
            let expected_rank = match mover {
                Color::White => 5,
                Color::Black => 2,
            };
            let consistent = target.rank().index() == expected_rank
                && self.piece_at(target).is_none()
                && pushed.and_then(|sq| self.piece_at(sq)) == Some((Piece::Pawn, mover.opposite()));
            if !consistent {
                return Err(BoardError::InvalidPosition(format!(
                    "en passant target {target} does not follow a double step"
                )));
            }
        }
        Ok(())
    }

    pub fn to_fen(&self) -> String {
        let mut placement = [None; 64];
        for sq in Square::all() {
            placement[sq.index() as usize] = self.piece_at(sq);
        }
        let castling = match self.castling.to_fen().as_str() {
            "-" => String::new(),
            letters => letters.to_string(),
        };
        FenFields {
            placement,
            side_to_move: self.side_to_move,
            castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
        .to_fen()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        let color = Color::BOTH
            .into_iter()
            .find(|c| self.colors[c.index()].contains(sq))?;
        Piece::ALL
            .into_iter()
            .find(|p| self.pieces[p.index()].contains(sq))
            .map(|p| (p, color))
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    /// All squares holding pieces of `color`.
    #[inline]
    pub fn occupancy(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline]
    pub fn pieces_of(&self, piece: Piece, color: Color) -> Bitboard {
        self.pieces[piece.index()] & self.colors[color.index()]
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces_of(Piece::King, color).first()
    }

    /// True if any piece of `by` attacks `sq`.
    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        let occupied = self.occupied();
        let queens = self.pieces_of(Piece::Queen, by);
        (pawn_attacks(sq, by.opposite()) & self.pieces_of(Piece::Pawn, by)).is_not_empty()
            || (knight_attacks(sq) & self.pieces_of(Piece::Knight, by)).is_not_empty()
            || (king_attacks(sq) & self.pieces_of(Piece::King, by)).is_not_empty()
            || (bishop_attacks(sq, occupied) & (self.pieces_of(Piece::Bishop, by) | queens))
                .is_not_empty()
            || (rook_attacks(sq, occupied) & (self.pieces_of(Piece::Rook, by) | queens))
                .is_not_empty()
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        self.king_square(color)
            .is_some_and(|king| self.is_square_attacked(king, color.opposite()))
    }

    /// True if the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.is_in_check(self.side_to_move)
    }

    pub fn signature(&self) -> Signature {
        Signature {
            pieces: self.pieces,
            colors: self.colors,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant,
        }
    }

    /// Neither side can ever mate: bare kings, a single minor piece, or
    /// bishops that all stand on one square color.
    pub fn is_insufficient_material(&self) -> bool {
        let heavy = self.pieces[Piece::Pawn.index()]
            | self.pieces[Piece::Rook.index()]
            | self.pieces[Piece::Queen.index()];
        if heavy.is_not_empty() {
            return false;
        }
        let knights = self.pieces[Piece::Knight.index()];
        let bishops = self.pieces[Piece::Bishop.index()];
        if (knights | bishops).count() <= 1 {
            return true;
        }
        knights.is_empty()
            && ((bishops & Bitboard::LIGHT_SQUARES).is_empty()
                || (bishops & !Bitboard::LIGHT_SQUARES).is_empty())
    }

    fn put(&mut self, sq: Square, piece: Piece, color: Color) {
        self.pieces[piece.index()].set(sq);
        self.colors[color.index()].set(sq);
    }

    fn remove(&mut self, sq: Square) -> Option<(Piece, Color)> {
        let occupant = self.piece_at(sq)?;
        self.pieces[occupant.0.index()].clear(sq);
        self.colors[occupant.1.index()].clear(sq);
        Some(occupant)
    }

    /// Plays `m` and returns the resulting board.
    ///
    /// Only checks that the source square holds a piece of the side to move;
    /// legality is the move generator's business. Castling and en passant
    /// are recognized from the geometry, so a move parsed from coordinates
    /// applies the same way as a generated one.
    pub fn apply(&self, m: Move) -> Result<Board, BoardError> {
        let us = self.side_to_move;
        let (from, to) = (m.from(), m.to());
        let piece = match self.piece_at(from) {
            Some((piece, color)) if color == us => piece,
            Some((_, color)) => {
                return Err(BoardError::IllegalState(format!(
                    "{m}: {from} holds a {color} piece but {us} is to move"
                )))
            }
            None => return Err(BoardError::IllegalState(format!("{m}: {from} is empty"))),
        };

        let mut next = self.clone();
        next.remove(from);
        let mut captured = next.remove(to).is_some();

        let file_step = to.file().index() as i8 - from.file().index() as i8;
        let rank_step = to.rank().index() as i8 - from.rank().index() as i8;

        if piece == Piece::Pawn && file_step != 0 && !captured && self.en_passant == Some(to) {
            if let Some(victim) = to.offset(0, -us.pawn_direction()) {
                captured = next.remove(victim).is_some();
            }
        }

        let landing = match m.promotion() {
            Some(promoted) if piece == Piece::Pawn => promoted,
            _ => piece,
        };
        next.put(to, landing, us);

        if piece == Piece::King && file_step.abs() == 2 {
            let path = castling_path(us, file_step > 0);
            if next.remove(path.rook_from).is_some() {
                next.put(path.rook_to, Piece::Rook, us);
            }
        }

        if piece == Piece::King {
            next.castling.revoke_all(us);
        }
        for color in Color::BOTH {
            for kingside in [true, false] {
                let rook_home = castling_path(color, kingside).rook_from;
                if from == rook_home || to == rook_home {
                    next.castling.revoke(color, kingside);
                }
            }
        }

        next.en_passant = if piece == Piece::Pawn && rank_step.abs() == 2 {
            from.offset(0, us.pawn_direction())
        } else {
            None
        };

        if piece == Piece::Pawn || captured {
            next.halfmove_clock = 0;
        } else {
            next.halfmove_clock += 1;
        }
        if us == Color::Black {
            next.fullmove_number += 1;
        }
        next.side_to_move = us.opposite();
        Ok(next)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::startpos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn uci(text: &str) -> Move {
        Move::from_uci(text).unwrap()
    }

    #[test]
    fn startpos_matches_fen() {
        let board = Board::startpos();
        assert_eq!(board.to_fen(), FenFields::STARTPOS);
        assert_eq!(board, Board::from_fen(FenFields::STARTPOS).unwrap());
        assert_eq!(board.occupied().count(), 32);
        assert_eq!(board.piece_at(Square::E1), Some((Piece::King, Color::White)));
        assert_eq!(board.piece_at(sq("e4")), None);
        assert_eq!(board.king_square(Color::Black), Some(Square::E8));
    }

    #[test]
    fn fen_roundtrip() {
        for fen in [
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        ] {
            assert_eq!(Board::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn rejects_impossible_positions() {
        for fen in [
            "8/8/8/8/8/8/8/4K3 w - - 0 1",
            "4k3/8/8/8/8/8/8/3KK3 w - - 0 1",
            "4k3/8/8/8/8/8/8/P3K3 w - - 0 1",
            "4k3/4R3/8/8/8/8/8/4K3 w - - 0 1",
            "4k3/8/8/8/8/8/8/4K3 w - e6 0 1",
        ] {
            assert!(
                matches!(Board::from_fen(fen), Err(BoardError::InvalidPosition(_))),
                "{fen}"
            );
        }
        assert!(matches!(Board::from_fen("garbage"), Err(BoardError::Fen(_))));
    }

    #[test]
    fn stale_castling_rights_are_dropped() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K2R w KQ - 0 1").unwrap();
        assert!(board.castling().kingside(Color::White));
        assert!(!board.castling().queenside(Color::White));
        assert_eq!(board.castling().to_fen(), "K");
    }

    #[test]
    fn apply_requires_own_piece() {
        let board = Board::startpos();
        assert!(matches!(board.apply(uci("e4e5")), Err(BoardError::IllegalState(_))));
        assert!(matches!(board.apply(uci("e7e5")), Err(BoardError::IllegalState(_))));
    }

    #[test]
    fn double_step_sets_en_passant_and_clocks() {
        let board = Board::startpos().apply(uci("e2e4")).unwrap();
        assert_eq!(board.en_passant(), Some(sq("e3")));
        assert_eq!(board.side_to_move(), Color::Black);
        assert_eq!(board.halfmove_clock(), 0);
        assert_eq!(board.fullmove_number(), 1);

        let board = board.apply(uci("g8f6")).unwrap();
        assert_eq!(board.en_passant(), None);
        assert_eq!(board.halfmove_clock(), 1);
        assert_eq!(board.fullmove_number(), 2);
    }

    #[test]
    fn en_passant_removes_the_passed_pawn() {
        let board =
            Board::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let after = board.apply(uci("e5f6")).unwrap();
        assert_eq!(after.piece_at(sq("f6")), Some((Piece::Pawn, Color::White)));
        assert_eq!(after.piece_at(sq("f5")), None);
        assert_eq!(after.piece_at(sq("d5")), Some((Piece::Pawn, Color::Black)));
        assert_eq!(after.halfmove_clock(), 0);
    }

    #[test]
    fn castling_moves_the_rook_and_clears_rights() {
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 3 10").unwrap();
        let after = board.apply(uci("e1g1")).unwrap();
        assert_eq!(after.piece_at(Square::G1), Some((Piece::King, Color::White)));
        assert_eq!(after.piece_at(Square::F1), Some((Piece::Rook, Color::White)));
        assert_eq!(after.piece_at(Square::H1), None);
        assert_eq!(after.castling().to_fen(), "kq");
        assert_eq!(after.halfmove_clock(), 4);

        let after = after.apply(uci("e8c8")).unwrap();
        assert_eq!(after.piece_at(Square::D8), Some((Piece::Rook, Color::Black)));
        assert_eq!(after.piece_at(Square::A8), None);
        assert!(after.castling().is_empty());
        assert_eq!(after.fullmove_number(), 11);
    }

    #[test]
    fn rook_capture_on_home_square_revokes_right() {
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let after = board.apply(uci("a1a8")).unwrap();
        assert_eq!(after.castling().to_fen(), "Kk");
        assert_eq!(after.halfmove_clock(), 0);
    }

    #[test]
    fn promotion_substitutes_the_piece() {
        let board = Board::from_fen("1n2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let after = board.apply(uci("a7b8n")).unwrap();
        assert_eq!(after.piece_at(sq("b8")), Some((Piece::Knight, Color::White)));
        assert_eq!(after.pieces_of(Piece::Pawn, Color::White).count(), 0);
    }

    #[test]
    fn attacks_and_check() {
        let board = Board::from_fen("4k3/8/8/8/8/8/3q4/4K3 w - - 0 1").unwrap();
        assert!(board.is_check());
        assert!(board.is_square_attacked(Square::D1, Color::Black));
        assert!(!board.is_square_attacked(sq("a4"), Color::Black));
        assert!(!board.is_in_check(Color::Black));
    }

    #[test]
    fn signature_ignores_clocks() {
        let a = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let b = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 12 40").unwrap();
        let c = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 b - - 0 1").unwrap();
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), c.signature());
    }

    #[test]
    fn insufficient_material() {
        for (fen, expected) in [
            ("4k3/8/8/8/8/8/8/4K3 w - - 0 1", true),
            ("4k3/8/8/8/8/8/8/4KN2 w - - 0 1", true),
            ("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1", true),
            ("2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1", false),
            ("3bk3/8/8/8/8/8/8/2B1K3 w - - 0 1", true),
            ("4k3/8/8/8/8/8/8/3NKN2 w - - 0 1", false),
            ("4k3/8/8/8/8/8/8/4K2R w - - 0 1", false),
            ("4k3/8/8/8/8/8/P7/4K3 w - - 0 1", false),
        ] {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.is_insufficient_material(), expected, "{fen}");
        }
    }
}
