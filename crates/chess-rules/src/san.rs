//! Standard Algebraic Notation (SAN): `e4`, `Nbd2`, `exd6`, `O-O`, `e8=Q+`.

use crate::movegen::legal_moves;
use crate::Board;
use chess_core::{File, Move, MoveKind, Piece, Rank, Square};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanError {
    #[error("empty SAN string")]
    Empty,

    #[error("invalid SAN format: {0}")]
    InvalidFormat(String),

    #[error("no legal move matches: {0}")]
    NoMatchingMove(String),

    #[error("ambiguous move: {0}")]
    AmbiguousMove(String),
}

/// Formats a legal move in SAN, including the `+` or `#` suffix.
///
/// `board` is the position before the move. Moves that are not legal on
/// `board` fall back to coordinate notation.
pub fn move_to_san(board: &Board, m: Move) -> String {
    let Some((piece, _)) = board.piece_at(m.from()) else {
        return m.to_uci();
    };
    let legal = legal_moves(board);
    if !legal.contains(m) {
        return m.to_uci();
    }

    let mut san = match m.kind() {
        MoveKind::CastleKingside => "O-O".to_string(),
        MoveKind::CastleQueenside => "O-O-O".to_string(),
        _ => {
            let mut san = String::with_capacity(8);
            match piece.san_char() {
                Some(letter) => {
                    san.push(letter);
                    san.push_str(&disambiguation(board, m, piece, legal.as_slice()));
                    if m.is_capture() {
                        san.push('x');
                    }
                }
                None if m.is_capture() => {
                    san.push(m.from().file().to_char());
                    san.push('x');
                }
                None => {}
            }
            san.push_str(&m.to().to_algebraic());
            if let Some(promoted) = m.promotion().and_then(Piece::san_char) {
                san.push('=');
                san.push(promoted);
            }
            san
        }
    };

    if let Ok(next) = board.apply(m) {
        if next.is_check() {
            san.push(if legal_moves(&next).is_empty() { '#' } else { '+' });
        }
    }
    san
}

/// File, rank or both, whichever is the shortest prefix telling `m` apart
/// from other moves of the same piece kind to the same square.
fn disambiguation(board: &Board, m: Move, piece: Piece, legal: &[Move]) -> String {
    let from = m.from();
    let rivals: Vec<Square> = legal
        .iter()
        .filter(|other| other.to() == m.to() && other.from() != from)
        .filter(|other| board.piece_at(other.from()).map(|(p, _)| p) == Some(piece))
        .map(|other| other.from())
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|sq| sq.file() != from.file()) {
        from.file().to_string()
    } else if rivals.iter().all(|sq| sq.rank() != from.rank()) {
        from.rank().to_string()
    } else {
        from.to_algebraic()
    }
}

#[derive(Debug)]
struct SanPattern {
    piece: Piece,
    from_file: Option<File>,
    from_rank: Option<Rank>,
    to: Square,
    promotion: Option<Piece>,
}

/// Parses SAN against `board` and returns the matching legal move.
///
/// Accepts `0-0` for castling, promotions with or without `=`, and trailing
/// check marks or annotation glyphs (`+`, `#`, `!`, `?`).
pub fn san_to_move(board: &Board, san: &str) -> Result<Move, SanError> {
    let text = san
        .trim()
        .trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'));
    if text.is_empty() {
        return Err(SanError::Empty);
    }

    let legal = legal_moves(board);

    let castle = match text {
        "O-O" | "0-0" => Some(MoveKind::CastleKingside),
        "O-O-O" | "0-0-0" => Some(MoveKind::CastleQueenside),
        _ => None,
    };
    if let Some(kind) = castle {
        return legal
            .into_iter()
            .find(|m| m.kind() == kind)
            .ok_or_else(|| SanError::NoMatchingMove(text.to_string()));
    }

    let pattern = parse_pattern(text)?;
    let mut candidates = legal.into_iter().filter(|m| {
        m.to() == pattern.to
            && m.promotion() == pattern.promotion
            && board.piece_at(m.from()).map(|(p, _)| p) == Some(pattern.piece)
            && pattern.from_file.map_or(true, |f| m.from().file() == f)
            && pattern.from_rank.map_or(true, |r| m.from().rank() == r)
    });

    match (candidates.next(), candidates.next()) {
        (Some(m), None) => Ok(m),
        (None, _) => Err(SanError::NoMatchingMove(text.to_string())),
        (Some(_), Some(_)) => Err(SanError::AmbiguousMove(text.to_string())),
    }
}

fn parse_pattern(text: &str) -> Result<SanPattern, SanError> {
    let invalid = || SanError::InvalidFormat(text.to_string());
    let mut chars: Vec<char> = text.chars().filter(|c| *c != 'x' && *c != '-').collect();

    let piece = match chars.first().copied() {
        Some(c) if c.is_ascii_uppercase() => {
            chars.remove(0);
            Piece::from_san_char(c).ok_or_else(invalid)?
        }
        _ => Piece::Pawn,
    };

    let promotion = match chars.last().copied() {
        Some(c) if c.is_ascii_alphabetic() && piece == Piece::Pawn && chars.len() > 2 => {
            let promoted = Piece::from_promotion_char(c)
                .filter(|_| c.is_ascii_uppercase() || chars.len() == 3)
                .ok_or_else(invalid)?;
            chars.pop();
            if chars.last() == Some(&'=') {
                chars.pop();
            }
            Some(promoted)
        }
        _ => None,
    };
    if chars.contains(&'=') {
        return Err(invalid());
    }

    if chars.len() < 2 || chars.len() > 4 {
        return Err(invalid());
    }
    let split = chars.len() - 2;
    let target: String = chars[split..].iter().collect();
    let to = Square::from_algebraic(&target).ok_or_else(invalid)?;

    let (mut from_file, mut from_rank) = (None, None);
    for c in &chars[..split] {
        if let Some(file) = File::from_char(*c).filter(|_| c.is_ascii_lowercase()) {
            if from_file.replace(file).is_some() {
                return Err(invalid());
            }
        } else if let Some(rank) = Rank::from_char(*c) {
            if from_rank.replace(rank).is_some() {
                return Err(invalid());
            }
        } else {
            return Err(invalid());
        }
    }

    if piece == Piece::Pawn && from_file.is_none() {
        from_file = Some(to.file());
    }

    Ok(SanPattern {
        piece,
        from_file,
        from_rank,
        to,
        promotion,
    })
}
