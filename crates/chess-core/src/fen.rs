//! FEN (Forsyth-Edwards Notation) tokenizing and formatting.
//!
//! This layer checks syntax only. Whether the described position can occur
//! (one king per side, side not to move not in check) is decided by the
//! board that consumes the fields.

use crate::{Color, Piece, Square};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 4 or 6 fields, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),
}

/// The six FEN fields, decoded into typed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenFields {
    /// Occupant of each square, indexed like [`Square::index`].
    pub placement: [Option<(Piece, Color)>; 64],
    pub side_to_move: Color,
    /// Castling letters in `KQkq` order; empty when nobody may castle.
    pub castling: String,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl FenFields {
    /// The standard starting position.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Parses a FEN string.
    ///
    /// The two clock fields may be omitted, in which case they default to
    /// `0` and `1`.
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let placement = parse_placement(parts[0])?;

        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = parse_castling(parts[2])?;

        let en_passant = match parts[3] {
            "-" => None,
            field => {
                let square = Square::from_algebraic(field)
                    .filter(|sq| sq.rank().index() == 2 || sq.rank().index() == 5)
                    .ok_or_else(|| FenError::InvalidEnPassantSquare(field.to_string()))?;
                Some(square)
            }
        };

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let halfmove = parts[4]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidHalfmoveClock(parts[4].to_string()))?;
            let fullmove = parts[5]
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| FenError::InvalidFullmoveNumber(parts[5].to_string()))?;
            (halfmove, fullmove)
        } else {
            (0, 1)
        };

        Ok(FenFields {
            placement,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// Formats the fields back into a six-field FEN string.
    pub fn to_fen(&self) -> String {
        let mut placement = String::with_capacity(72);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.placement[rank * 8 + file] {
                    Some((piece, color)) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }

        let castling = if self.castling.is_empty() {
            "-"
        } else {
            self.castling.as_str()
        };
        let en_passant = self
            .en_passant
            .map_or_else(|| "-".to_string(), Square::to_algebraic);

        format!(
            "{} {} {} {} {} {}",
            placement,
            self.side_to_move.fen_char(),
            castling,
            en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

impl Default for FenFields {
    fn default() -> Self {
        let mut placement = [None; 64];
        let back = [
            Piece::Rook,
            Piece::Knight,
            Piece::Bishop,
            Piece::Queen,
            Piece::King,
            Piece::Bishop,
            Piece::Knight,
            Piece::Rook,
        ];
        for (file, piece) in back.into_iter().enumerate() {
            placement[file] = Some((piece, Color::White));
            placement[8 + file] = Some((Piece::Pawn, Color::White));
            placement[48 + file] = Some((Piece::Pawn, Color::Black));
            placement[56 + file] = Some((piece, Color::Black));
        }
        FenFields {
            placement,
            side_to_move: Color::White,
            castling: "KQkq".to_string(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }
}

fn parse_placement(field: &str) -> Result<[Option<(Piece, Color)>; 64], FenError> {
    let rows: Vec<&str> = field.split('/').collect();
    if rows.len() != 8 {
        return Err(FenError::InvalidPiecePlacement(format!(
            "expected 8 ranks, got {}",
            rows.len()
        )));
    }

    let mut placement = [None; 64];
    for (row, text) in rows.iter().enumerate() {
        let rank = 7 - row;
        let mut file = 0usize;
        for c in text.chars() {
            if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                file += skip as usize;
            } else if let Some(occupant) = Piece::from_fen_char(c) {
                if file < 8 {
                    placement[rank * 8 + file] = Some(occupant);
                }
                file += 1;
            } else {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "invalid character '{}' in rank {}",
                    c,
                    rank + 1
                )));
            }
            if file > 8 {
                break;
            }
        }
        if file != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "rank {} does not describe exactly 8 squares",
                rank + 1
            )));
        }
    }
    Ok(placement)
}

fn parse_castling(field: &str) -> Result<String, FenError> {
    if field == "-" {
        return Ok(String::new());
    }
    let mut seen = String::new();
    for c in field.chars() {
        if !"KQkq".contains(c) || seen.contains(c) {
            return Err(FenError::InvalidCastlingRights(field.to_string()));
        }
        seen.push(c);
    }
    Ok("KQkq".chars().filter(|c| seen.contains(*c)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_KINGS: &str = "4k3/8/8/8/8/8/8/4K3";

    #[test]
    fn parse_startpos() {
        let fen = FenFields::parse(FenFields::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, Color::White);
        assert_eq!(fen.castling, "KQkq");
        assert_eq!(fen.en_passant, None);
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.placement[Square::E1.index() as usize], Some((Piece::King, Color::White)));
        assert_eq!(fen.placement[Square::D8.index() as usize], Some((Piece::Queen, Color::Black)));
        assert_eq!(fen, FenFields::default());
    }

    #[test]
    fn roundtrip() {
        for original in [
            FenFields::STARTPOS,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ] {
            assert_eq!(FenFields::parse(original).unwrap().to_fen(), original);
        }
    }

    #[test]
    fn clocks_are_optional() {
        let fen = FenFields::parse(&format!("{EMPTY_KINGS} b - -")).unwrap();
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.to_fen(), format!("{EMPTY_KINGS} b - - 0 1"));
    }

    #[test]
    fn castling_is_normalized() {
        let fen = FenFields::parse(&format!("{EMPTY_KINGS} w qK - 0 1")).unwrap();
        assert_eq!(fen.castling, "Kq");
        assert!(matches!(
            FenFields::parse(&format!("{EMPTY_KINGS} w KK - 0 1")),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            FenFields::parse(&format!("{EMPTY_KINGS} w XYZ - 0 1")),
            Err(FenError::InvalidCastlingRights(_))
        ));
    }

    #[test]
    fn field_count() {
        assert_eq!(FenFields::parse("invalid"), Err(FenError::InvalidPartCount(1)));
        assert_eq!(
            FenFields::parse(&format!("{EMPTY_KINGS} w - - 0")),
            Err(FenError::InvalidPartCount(5))
        );
    }

    #[test]
    fn bad_placement() {
        for placement in [
            "8/8/8/8/8/8/8",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPXPPP/RNBQKBNR",
            "rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR",
            "7/8/8/8/8/8/8/8",
            "09/8/8/8/8/8/8/8",
        ] {
            assert!(
                matches!(
                    FenFields::parse(&format!("{placement} w - - 0 1")),
                    Err(FenError::InvalidPiecePlacement(_))
                ),
                "{placement}"
            );
        }
    }

    #[test]
    fn bad_scalars() {
        assert!(matches!(
            FenFields::parse(&format!("{EMPTY_KINGS} x - - 0 1")),
            Err(FenError::InvalidActiveColor(_))
        ));
        for ep in ["abc", "x3", "e4"] {
            assert!(matches!(
                FenFields::parse(&format!("{EMPTY_KINGS} w - {ep} 0 1")),
                Err(FenError::InvalidEnPassantSquare(_))
            ));
        }
        assert!(matches!(
            FenFields::parse(&format!("{EMPTY_KINGS} w - - abc 1")),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        assert!(matches!(
            FenFields::parse(&format!("{EMPTY_KINGS} w - - 0 0")),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
    }

    #[test]
    fn en_passant_square() {
        let fen = FenFields::parse(&format!("{EMPTY_KINGS} b - d6 0 1")).unwrap();
        assert_eq!(fen.en_passant, Square::from_algebraic("d6"));
    }

    #[test]
    fn error_messages_name_the_field() {
        assert!(FenError::InvalidPartCount(3).to_string().contains('3'));
        assert!(FenError::InvalidHalfmoveClock("abc".into()).to_string().contains("abc"));
        assert!(FenError::InvalidEnPassantSquare("z9".into()).to_string().contains("z9"));
    }
}
