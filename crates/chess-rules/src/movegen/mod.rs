//! Move generation and the legality filter.
//!
//! Generation runs in two passes: [`pseudo_legal_moves`] follows piece
//! geometry only, then [`legal_moves`] plays each candidate on a scratch
//! board and drops those that leave the mover's king attacked.

mod attacks;
pub mod perft;

use crate::board::castling_path;
use crate::{Bitboard, Board};
use chess_core::{Color, Move, MoveFlag, Piece, Square};

pub use attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
};

/// A fixed-capacity list of moves.
///
/// No legal position has more than 218 moves, so generation never allocates.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; Self::MAX_MOVES],
    len: usize,
}

impl MoveList {
    pub const MAX_MOVES: usize = 256;

    #[inline]
    pub const fn new() -> Self {
        MoveList {
            moves: [Move::NULL; Self::MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, m: Move) {
        debug_assert!(self.len < Self::MAX_MOVES);
        if self.len < Self::MAX_MOVES {
            self.moves[self.len] = m;
            self.len += 1;
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }

    #[inline]
    pub fn contains(&self, m: Move) -> bool {
        self.as_slice().contains(&m)
    }

    /// Keeps only the moves for which `keep` returns true, preserving order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Move) -> bool,
    {
        let mut write = 0;
        for read in 0..self.len {
            if keep(&self.moves[read]) {
                self.moves[write] = self.moves[read];
                write += 1;
            }
        }
        self.len = write;
    }

    /// The UCI strings of all moves, sorted.
    pub fn to_uci_sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.iter().map(|m| m.to_uci()).collect();
        names.sort();
        names
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for MoveList {
    type Output = Move;

    #[inline]
    fn index(&self, index: usize) -> &Move {
        &self.as_slice()[index]
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owning iterator over a [`MoveList`].
pub struct MoveListIntoIter {
    list: MoveList,
    next: usize,
}

impl Iterator for MoveListIntoIter {
    type Item = Move;

    fn next(&mut self) -> Option<Move> {
        let m = self.list.as_slice().get(self.next).copied()?;
        self.next += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.list.len - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for MoveListIntoIter {}

impl IntoIterator for MoveList {
    type Item = Move;
    type IntoIter = MoveListIntoIter;

    fn into_iter(self) -> MoveListIntoIter {
        MoveListIntoIter { list: self, next: 0 }
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Squares a `piece` of `color` standing on `square` may move to, ignoring
/// castling and self-check.
///
/// Pawns get pushes (double step from their start rank through an empty
/// square), diagonal captures and the board's en-passant target. Every other
/// kind gets its attack set minus squares held by its own side.
pub fn destinations(piece: Piece, color: Color, square: Square, board: &Board) -> Bitboard {
    let occupied = board.occupied();
    let own = board.occupancy(color);
    match piece {
        Piece::Pawn => {
            let mut targets = Bitboard::EMPTY;
            let dir = color.pawn_direction();
            if let Some(one) = square.offset(0, dir).filter(|sq| !occupied.contains(*sq)) {
                targets.set(one);
                if square.rank().index() == color.pawn_rank() {
                    if let Some(two) = one.offset(0, dir).filter(|sq| !occupied.contains(*sq)) {
                        targets.set(two);
                    }
                }
            }
            let mut capturable = board.occupancy(color.opposite());
            if let Some(ep) = board.en_passant() {
                capturable.set(ep);
            }
            targets | (pawn_attacks(square, color) & capturable)
        }
        Piece::Knight => knight_attacks(square) & !own,
        Piece::Bishop => bishop_attacks(square, occupied) & !own,
        Piece::Rook => rook_attacks(square, occupied) & !own,
        Piece::Queen => queen_attacks(square, occupied) & !own,
        Piece::King => king_attacks(square) & !own,
    }
}

/// All moves that follow piece geometry for the side to move, including
/// castling when the right is held and the squares between are empty.
pub fn pseudo_legal_moves(board: &Board) -> MoveList {
    let mut moves = MoveList::new();
    let us = board.side_to_move();
    let them = board.occupancy(us.opposite());

    for piece in Piece::ALL {
        for from in board.pieces_of(piece, us) {
            for to in destinations(piece, us, from, board) {
                let capture = them.contains(to);
                if piece == Piece::Pawn {
                    push_pawn_move(&mut moves, board, from, to, capture);
                } else {
                    let flag = if capture { MoveFlag::Capture } else { MoveFlag::Quiet };
                    moves.push(Move::new(from, to, flag));
                }
            }
        }
    }

    for kingside in [true, false] {
        if !board.castling().has(us, kingside) {
            continue;
        }
        let path = castling_path(us, kingside);
        let rook_home = board.piece_at(path.rook_from) == Some((Piece::Rook, us));
        if rook_home && (board.occupied() & path.between).is_empty() {
            let flag = if kingside {
                MoveFlag::CastleKingside
            } else {
                MoveFlag::CastleQueenside
            };
            moves.push(Move::new(path.king_from, path.king_to, flag));
        }
    }

    moves
}

fn push_pawn_move(moves: &mut MoveList, board: &Board, from: Square, to: Square, capture: bool) {
    let us = board.side_to_move();
    if to.rank().index() == us.promotion_rank() {
        for piece in Piece::PROMOTIONS {
            if let Some(flag) = MoveFlag::promotion(piece, capture) {
                moves.push(Move::new(from, to, flag));
            }
        }
        return;
    }
    let rank_step = (to.rank().index() as i8 - from.rank().index() as i8).abs();
    let flag = if capture {
        MoveFlag::Capture
    } else if from.file() != to.file() {
        MoveFlag::EnPassant
    } else if rank_step == 2 {
        MoveFlag::DoublePush
    } else {
        MoveFlag::Quiet
    };
    moves.push(Move::new(from, to, flag));
}

/// The legal moves for the side to move.
///
/// Freshly generated on every call; order is unspecified but stable for
/// equal boards.
pub fn legal_moves(board: &Board) -> MoveList {
    let us = board.side_to_move();
    let in_check = board.is_check();
    let mut moves = pseudo_legal_moves(board);
    moves.retain(|m| {
        if m.flag().is_castling() {
            let transit = castling_path(us, m.flag() == MoveFlag::CastleKingside).transit;
            if in_check || board.is_square_attacked(transit, us.opposite()) {
                return false;
            }
        }
        board
            .apply(*m)
            .map(|next| !next.is_in_check(us))
            .unwrap_or(false)
    });
    moves
}

/// True if `m` is one of the legal moves on `board`, flags included.
pub fn is_legal(board: &Board, m: Move) -> bool {
    legal_moves(board).contains(m)
}

/// Maps coordinate notation such as `e2e4` or `e7e8q` to the matching
/// legal move with its full flags.
pub fn resolve_uci(board: &Board, text: &str) -> Option<Move> {
    let parsed = Move::from_uci(text.trim())?;
    legal_moves(board)
        .into_iter()
        .find(|m| m.same_coordinates(parsed))
}
