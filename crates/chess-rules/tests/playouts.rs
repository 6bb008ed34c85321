//! Random playouts checking properties that must hold in every position.

use chess_core::Color;
use chess_rules::{legal_moves, pseudo_legal_moves, Board, Game, GameState};
use proptest::prelude::*;

const START_FENS: [&str; 3] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
];

/// Plays the move chosen by each selector in turn, stopping at a terminal state.
fn playout(fen: &str, choices: &[usize], mut visit: impl FnMut(&Game)) -> Game {
    let mut game = Game::from_fen(fen).unwrap();
    visit(&game);
    for &choice in choices {
        let moves = game.legal_moves();
        if moves.is_empty() {
            break;
        }
        game.submit_move(moves[choice % moves.len()]).unwrap();
        visit(&game);
    }
    game
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn no_legal_move_leaves_the_mover_in_check(
        start in 0..START_FENS.len(),
        choices in prop::collection::vec(any::<usize>(), 0..60),
    ) {
        playout(START_FENS[start], &choices, |game| {
            let board = game.board();
            let mover = board.side_to_move();
            for m in &legal_moves(board) {
                let next = board.apply(*m).unwrap();
                assert!(!next.is_in_check(mover), "{} leaves {mover} in check", m.to_uci());
            }
        });
    }

    #[test]
    fn legal_moves_are_a_deterministic_subset_of_pseudo_legal(
        start in 0..START_FENS.len(),
        choices in prop::collection::vec(any::<usize>(), 0..60),
    ) {
        playout(START_FENS[start], &choices, |game| {
            let board = game.board();
            let legal = legal_moves(board);
            let pseudo = pseudo_legal_moves(board);
            assert_eq!(legal.as_slice(), legal_moves(board).as_slice());
            assert!(legal.iter().all(|m| pseudo.contains(*m)));
        });
    }

    #[test]
    fn fen_round_trips_through_a_game(
        start in 0..START_FENS.len(),
        choices in prop::collection::vec(any::<usize>(), 0..60),
    ) {
        playout(START_FENS[start], &choices, |game| {
            let fen = game.board().to_fen();
            let reparsed = Board::from_fen(&fen).unwrap();
            assert_eq!(reparsed.to_fen(), fen);
            assert_eq!(reparsed.signature(), game.board().signature());
        });
    }

    #[test]
    fn terminal_states_match_the_board(
        start in 0..START_FENS.len(),
        choices in prop::collection::vec(any::<usize>(), 0..120),
    ) {
        let game = playout(START_FENS[start], &choices, |_| {});
        let board = game.board();
        match game.state() {
            GameState::CheckmateWhiteWins => {
                prop_assert!(board.is_check());
                prop_assert_eq!(board.side_to_move(), Color::Black);
                prop_assert!(legal_moves(board).is_empty());
            }
            GameState::CheckmateBlackWins => {
                prop_assert!(board.is_check());
                prop_assert_eq!(board.side_to_move(), Color::White);
                prop_assert!(legal_moves(board).is_empty());
            }
            GameState::StalemateDraw => {
                prop_assert!(!board.is_check());
                prop_assert!(legal_moves(board).is_empty());
            }
            GameState::FiftyMoveDraw => prop_assert!(board.halfmove_clock() >= 100),
            GameState::ThreefoldRepetitionDraw => prop_assert!(game.repetition_count() >= 3),
            GameState::InsufficientMaterialDraw => prop_assert!(board.is_insufficient_material()),
            GameState::InProgress => prop_assert!(!legal_moves(board).is_empty()),
            other => prop_assert!(false, "unexpected state {other}"),
        }
    }

    #[test]
    fn undo_walks_back_to_the_start(
        choices in prop::collection::vec(any::<usize>(), 0..40),
    ) {
        let mut game = playout(START_FENS[0], &choices, |_| {});
        while game.undo().is_ok() {}
        prop_assert_eq!(game.board(), &Board::startpos());
        prop_assert!(game.record().is_empty());
        prop_assert_eq!(game.state(), GameState::InProgress);
    }
}
