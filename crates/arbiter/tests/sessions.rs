//! Whole sessions with scripted engines in one or both seats.

#![cfg(unix)]

mod common;

use arbiter::analysis::MATE_SCORE;
use arbiter::{
    AnalysisConfig, Clock, EngineError, EngineSeat, GameAnalyzer, HumanAction, HumanPlayer,
    MoveQuality, SearchLimit, Seat, Session, SessionError, TimeControl, UciClient,
};
use chess_core::Color;
use chess_rules::{Game, GameError, GameResult, GameState};
use common::{engine, quick_limits};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

fn start(variant: &str) -> UciClient {
    UciClient::start(engine(variant), &[], &quick_limits()).unwrap()
}

fn seat(client: &mut UciClient) -> Seat<'_> {
    Seat::Engine(EngineSeat {
        client,
        limit: SearchLimit::Depth(1),
    })
}

struct Typist {
    inputs: VecDeque<HumanAction>,
    seen: Vec<String>,
}

impl Typist {
    fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs
                .iter()
                .map(|s| match *s {
                    "resign" => HumanAction::Resign,
                    mv => HumanAction::Move(mv.to_string()),
                })
                .collect(),
            seen: Vec::new(),
        }
    }
}

impl HumanPlayer for Typist {
    fn choose(&mut self, _game: &Game) -> std::io::Result<HumanAction> {
        self.inputs.pop_front().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "out of moves")
        })
    }

    fn rejected(&mut self, input: &str, _error: &GameError) {
        panic!("unexpected rejection of {}", input);
    }

    fn observe(&mut self, game: &Game) {
        if let Some(entry) = game.record().last() {
            self.seen.push(entry.san.clone());
        }
    }
}

#[test]
fn two_engines_finish_a_game() {
    let mut white = start("normal");
    let mut black = start("normal");
    let mut game = Game::new();

    let outcome = Session::new(&mut game, seat(&mut white), seat(&mut black))
        .run()
        .unwrap();

    assert!(outcome.state.is_terminal());
    assert!(outcome.state.is_board_derived());
    assert!(outcome.result.is_some());
    assert_eq!(outcome.plies, game.record().len());
    assert_eq!(outcome.final_fen, game.board().to_fen());

    // The record replays to the same final position.
    let mut replay = Game::new();
    for entry in game.record() {
        replay.submit_move(entry.mov).unwrap();
    }
    assert_eq!(replay.board(), game.board());
    assert_eq!(replay.state(), game.state());
}

#[test]
fn human_against_engine_then_resigns() {
    let mut client = start("normal");
    let mut human = Typist::new(&["e4", "resign"]);
    let mut game = Game::new();

    let outcome = Session::new(&mut game, Seat::Human(&mut human), seat(&mut client))
        .run()
        .unwrap();

    assert_eq!(outcome.state, GameState::Resigned(Color::White));
    assert_eq!(outcome.result, Some(GameResult::BlackWins));
    assert_eq!(outcome.plies, 2);
    // Told about both moves and the resignation.
    assert_eq!(human.seen.len(), 3);
    assert_eq!(human.seen[0], "e4");
    assert_eq!(human.seen[1], game.record()[1].san);
}

#[test]
fn crashing_engine_is_restarted_until_the_limit() {
    let mut white = start("crash-on-go");
    let mut black = start("normal");
    let mut game = Game::new();

    let result = Session::new(&mut game, seat(&mut white), seat(&mut black))
        .with_restart_limit(1)
        .run();

    assert!(matches!(
        result,
        Err(SessionError::Engine(EngineError::Disconnected))
    ));
    assert!(game.record().is_empty());
    assert_eq!(game.state(), GameState::InProgress);
}

#[test]
fn slow_engine_loses_on_time() {
    let mut white = start("slow");
    let mut black = start("normal");
    let mut game = Game::new();
    let clock = Clock::new(TimeControl::new(Duration::from_millis(500), Duration::ZERO));

    let outcome = Session::new(&mut game, seat(&mut white), seat(&mut black))
        .with_clock(clock)
        .run()
        .unwrap();

    assert_eq!(outcome.state, GameState::TimeForfeit(Color::White));
    assert_eq!(outcome.result, Some(GameResult::BlackWins));
    // The late second move is never played.
    assert_eq!(outcome.plies, 2);
}

#[test]
fn hung_engine_forfeits_when_its_flag_falls() {
    let mut white = start("unresponsive");
    let mut black = start("normal");
    let pid = white.process_id().unwrap();
    let mut game = Game::new();
    let clock = Clock::new(TimeControl::new(Duration::from_millis(300), Duration::ZERO));

    let outcome = Session::new(&mut game, seat(&mut white), seat(&mut black))
        .with_clock(clock)
        .run()
        .unwrap();

    assert_eq!(outcome.state, GameState::TimeForfeit(Color::White));
    assert_eq!(outcome.plies, 0);
    assert!(white.process_id().is_none());
    #[cfg(target_os = "linux")]
    assert!(!common::process_exists(pid));
    let _ = pid;
}

#[test]
fn flag_fall_is_not_followed_by_a_restart() {
    let mut white = start("unresponsive");
    let mut black = start("normal");
    let mut game = Game::new();
    let clock = Clock::new(TimeControl::new(Duration::from_millis(300), Duration::ZERO));

    let started = Instant::now();
    let outcome = Session::new(&mut game, seat(&mut white), seat(&mut black))
        .with_clock(clock)
        .with_restart_limit(1)
        .run()
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.state, GameState::TimeForfeit(Color::White));
    assert!(elapsed < Duration::from_millis(900), "took {:?}", elapsed);
    assert!(white.process_id().is_none());
}

#[test]
fn analysis_of_fools_mate() {
    let mut game = Game::new();
    for mv in ["f3", "e5", "g4", "Qh4#"] {
        game.submit_san(mv).unwrap();
    }

    let mut client = start("normal");
    let analysis = GameAnalyzer::new(&mut client, AnalysisConfig { depth: 2 })
        .analyse_game(&game)
        .unwrap();

    assert_eq!(analysis.moves.len(), 4);
    assert_eq!(analysis.white.total_moves, 2);
    assert_eq!(analysis.black.total_moves, 2);

    let mate = &analysis.moves[3];
    assert_eq!(mate.san, "Qh4#");
    assert_eq!(mate.color, Color::Black);
    assert_eq!(mate.best_move.as_deref(), Some("d8h4"));
    assert_eq!(mate.quality, MoveQuality::Best);
    assert_eq!(mate.eval_after, -MATE_SCORE);

    // g4 walks into the mate.
    let g4 = &analysis.moves[2];
    assert!(g4.eval_after < -1_000);

    let pgn = arbiter::to_pgn(&game, &arbiter::PgnHeaders::default(), Some(&analysis));
    assert!(pgn.contains("Qh4# {-100.00 -> -100.00 (0.00)} 0-1"));
}
