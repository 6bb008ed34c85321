//! Perft: leaf-node counts used to check the generator against known values.

use super::legal_moves;
use crate::Board;

/// Number of leaf nodes of the legal-move tree `depth` plies deep.
pub fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(board);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .into_iter()
        .filter_map(|m| board.apply(m).ok())
        .map(|next| perft(&next, depth - 1))
        .sum()
}

/// Per-move breakdown of [`perft`], sorted by UCI string.
pub fn perft_divide(board: &Board, depth: u32) -> Vec<(String, u64)> {
    let mut results: Vec<(String, u64)> = legal_moves(board)
        .into_iter()
        .filter_map(|m| {
            let next = board.apply(m).ok()?;
            Some((m.to_uci(), perft(&next, depth.saturating_sub(1))))
        })
        .collect();
    results.sort();
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

    fn check(fen: &str, expected: &[u64]) {
        let board = Board::from_fen(fen).unwrap();
        for (depth, nodes) in expected.iter().enumerate() {
            assert_eq!(perft(&board, depth as u32 + 1), *nodes, "{fen} depth {}", depth + 1);
        }
    }

    #[test]
    fn startpos() {
        check(chess_core::FenFields::STARTPOS, &[20, 400, 8902, 197_281]);
    }

    #[test]
    #[ignore = "slow in debug builds"]
    fn startpos_depth_5() {
        assert_eq!(perft(&Board::startpos(), 5), 4_865_609);
    }

    #[test]
    fn kiwipete() {
        check(KIWIPETE, &[48, 2039, 97_862]);
    }

    #[test]
    fn position_3() {
        check(POSITION_3, &[14, 191, 2812, 43_238]);
    }

    #[test]
    fn position_4() {
        check(POSITION_4, &[6, 264, 9467]);
    }

    #[test]
    fn position_5() {
        check(POSITION_5, &[44, 1486, 62_379]);
    }

    #[test]
    fn divide_sums_to_perft() {
        let board = Board::from_fen(KIWIPETE).unwrap();
        let divide = perft_divide(&board, 2);
        assert_eq!(divide.len(), 48);
        assert_eq!(divide.iter().map(|(_, n)| n).sum::<u64>(), 2039);
        assert!(divide.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(divide.iter().any(|(name, _)| name == "e1g1"));
    }
}
