//! Session orchestration: runs one game between two seats.
//!
//! Each seat is either a human, asked for input through [`HumanPlayer`], or
//! an engine driven through a [`UciClient`]. The session alternates between
//! them until the [`Game`] reaches a terminal state, charging thinking time
//! to the optional [`Clock`].

use crate::clock::Clock;
use crate::uci_client::{EngineError, SearchBudget, UciClient};
use chess_core::{Color, Move};
use chess_rules::{Game, GameError, GameResult, GameState};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("game error: {0}")]
    Game(#[from] GameError),
    #[error("input error: {0}")]
    Input(#[from] std::io::Error),
}

/// What a human chose to do on their turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanAction {
    /// A move in coordinate notation or SAN.
    Move(String),
    Resign,
}

/// Source of moves for a human seat.
pub trait HumanPlayer {
    /// Asks for the next action in the current position.
    fn choose(&mut self, game: &Game) -> std::io::Result<HumanAction>;

    /// Reports input that did not name a legal move; `choose` is called again.
    fn rejected(&mut self, input: &str, error: &GameError);

    /// Called after every ply, whoever played it.
    fn observe(&mut self, _game: &Game) {}
}

/// Search limit for an engine seat when no clock is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    Depth(u32),
    MoveTime(Duration),
}

impl SearchLimit {
    pub fn budget(self) -> SearchBudget {
        match self {
            SearchLimit::Depth(d) => SearchBudget::Depth(d),
            SearchLimit::MoveTime(t) => SearchBudget::MoveTime(t),
        }
    }
}

impl Default for SearchLimit {
    fn default() -> Self {
        SearchLimit::MoveTime(Duration::from_millis(500))
    }
}

pub struct EngineSeat<'a> {
    pub client: &'a mut UciClient,
    pub limit: SearchLimit,
}

pub enum Seat<'a> {
    Human(&'a mut dyn HumanPlayer),
    Engine(EngineSeat<'a>),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub state: GameState,
    pub result: Option<GameResult>,
    pub plies: usize,
    pub final_fen: String,
}

enum Action {
    Play(Move),
    Resign,
    Flagged,
}

pub struct Session<'a> {
    game: &'a mut Game,
    white: Seat<'a>,
    black: Seat<'a>,
    clock: Option<Clock>,
    restart_limit: u32,
    restarts: u32,
}

impl<'a> Session<'a> {
    pub fn new(game: &'a mut Game, white: Seat<'a>, black: Seat<'a>) -> Self {
        Self {
            game,
            white,
            black,
            clock: None,
            restart_limit: 0,
            restarts: 0,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// How many times a crashed or hung engine may be restarted in this session.
    pub fn with_restart_limit(mut self, limit: u32) -> Self {
        self.restart_limit = limit;
        self
    }

    pub fn clock(&self) -> Option<&Clock> {
        self.clock.as_ref()
    }

    pub fn game(&self) -> &Game {
        self.game
    }

    /// Plays until the game is over.
    pub fn run(&mut self) -> Result<SessionOutcome, SessionError> {
        for seat in [&mut self.white, &mut self.black] {
            if let Seat::Engine(engine) = seat {
                engine.client.new_game()?;
            }
        }

        while !self.game.state().is_terminal() {
            if let Err(e) = self.play_ply() {
                error!("session aborted: {}", e);
                return Err(e);
            }
        }

        let outcome = SessionOutcome {
            state: self.game.state(),
            result: self.game.state().result(),
            plies: self.game.record().len(),
            final_fen: self.game.board().to_fen(),
        };
        info!(
            state = %outcome.state,
            plies = outcome.plies,
            "game over: {}",
            outcome.result.map_or("*", GameResult::pgn_token)
        );
        Ok(outcome)
    }

    /// Obtains and applies one move for the side to move.
    pub fn play_ply(&mut self) -> Result<GameState, SessionError> {
        let mover = self.game.side_to_move();
        let started = Instant::now();

        let seat = match mover {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        let action = match seat {
            Seat::Human(player) => human_action(&mut **player, self.game)?,
            Seat::Engine(engine) => {
                let (budget, flag_falls) = match &self.clock {
                    Some(clock) => (clock.search_budget(), Some(started + clock.remaining(mover))),
                    None => (engine.limit.budget(), None),
                };
                let restarts = Restarts {
                    limit: self.restart_limit,
                    used: &mut self.restarts,
                    flag_falls,
                };
                match engine_move(engine, self.game, &budget, restarts) {
                    Ok(mv) => Action::Play(mv),
                    // Hung past its own clock: the flag fell before any move arrived.
                    Err(SessionError::Engine(EngineError::Timeout(_)))
                        if self
                            .clock
                            .as_ref()
                            .is_some_and(|c| started.elapsed() >= c.remaining(mover)) =>
                    {
                        Action::Flagged
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let elapsed = started.elapsed();
        let in_time = match &mut self.clock {
            Some(clock) => clock.charge(mover, elapsed),
            None => true,
        };

        let state = match action {
            _ if !in_time => self.game.forfeit_on_time(mover)?,
            Action::Flagged => self.game.forfeit_on_time(mover)?,
            Action::Resign => self.game.resign(mover)?,
            Action::Play(mv) => {
                let state = self.game.submit_move(mv)?;
                if let Some(clock) = &mut self.clock {
                    clock.add_increment(mover);
                }
                if let Some(entry) = self.game.record().last() {
                    info!(
                        ply = self.game.record().len(),
                        side = %mover,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "{}",
                        entry.san
                    );
                }
                state
            }
        };
        if state.is_terminal() && !state.is_board_derived() {
            info!("{}", state);
        }

        for seat in [&mut self.white, &mut self.black] {
            if let Seat::Human(player) = seat {
                player.observe(self.game);
            }
        }
        Ok(state)
    }
}

fn human_action(player: &mut dyn HumanPlayer, game: &Game) -> Result<Action, SessionError> {
    loop {
        match player.choose(game)? {
            HumanAction::Resign => return Ok(Action::Resign),
            HumanAction::Move(text) => match game.parse_move(&text) {
                Ok(mv) => return Ok(Action::Play(mv)),
                Err(e) => player.rejected(&text, &e),
            },
        }
    }
}

/// Restart bookkeeping for one engine move.
struct Restarts<'r> {
    limit: u32,
    used: &'r mut u32,
    /// When the mover's clock runs out, if a clock is running.
    flag_falls: Option<Instant>,
}

impl Restarts<'_> {
    fn available(&self) -> bool {
        *self.used < self.limit && self.flag_falls.map_or(true, |t| Instant::now() < t)
    }
}

/// Asks the engine for a move, restarting it after a crash or hang while
/// the session's restart budget lasts and the mover still has time.
fn engine_move(
    seat: &mut EngineSeat<'_>,
    game: &Game,
    budget: &SearchBudget,
    mut restarts: Restarts<'_>,
) -> Result<Move, SessionError> {
    loop {
        let attempt = seat
            .client
            .set_game(game)
            .and_then(|_| seat.client.request_best_move(game.board(), budget));
        match attempt {
            Ok(best) => return Ok(best.mv),
            Err(e @ (EngineError::Disconnected | EngineError::Timeout(_)))
                if restarts.available() =>
            {
                *restarts.used += 1;
                warn!(
                    "engine fault ({}), restart {} of {}",
                    e, *restarts.used, restarts.limit
                );
                seat.client.restart()?;
                seat.client.new_game()?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeControl;
    use std::collections::VecDeque;

    /// Plays scripted input and records what the session told it.
    struct Scripted {
        inputs: VecDeque<HumanAction>,
        rejected: Vec<String>,
        observed: usize,
    }

    impl Scripted {
        fn new(inputs: &[&str]) -> Self {
            Self {
                inputs: inputs
                    .iter()
                    .map(|s| match *s {
                        "resign" => HumanAction::Resign,
                        mv => HumanAction::Move(mv.to_string()),
                    })
                    .collect(),
                rejected: Vec::new(),
                observed: 0,
            }
        }
    }

    impl HumanPlayer for Scripted {
        fn choose(&mut self, _game: &Game) -> std::io::Result<HumanAction> {
            self.inputs.pop_front().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "script exhausted")
            })
        }

        fn rejected(&mut self, input: &str, _error: &GameError) {
            self.rejected.push(input.to_string());
        }

        fn observe(&mut self, _game: &Game) {
            self.observed += 1;
        }
    }

    #[test]
    fn two_humans_play_fools_mate() {
        let mut game = Game::new();
        let mut white = Scripted::new(&["f3", "g2g4"]);
        let mut black = Scripted::new(&["e5", "Qh4#"]);

        let outcome = Session::new(&mut game, Seat::Human(&mut white), Seat::Human(&mut black))
            .run()
            .unwrap();

        assert_eq!(outcome.state, GameState::CheckmateBlackWins);
        assert_eq!(outcome.result, Some(GameResult::BlackWins));
        assert_eq!(outcome.plies, 4);
        assert_eq!(white.observed, 4);
        assert_eq!(black.observed, 4);
    }

    #[test]
    fn illegal_input_is_reported_and_retried() {
        let mut game = Game::new();
        let mut white = Scripted::new(&["e2e5", "Ke2", "nonsense", "e4", "resign"]);
        let mut black = Scripted::new(&["e5"]);

        let outcome = Session::new(&mut game, Seat::Human(&mut white), Seat::Human(&mut black))
            .run()
            .unwrap();

        assert_eq!(white.rejected, vec!["e2e5", "Ke2", "nonsense"]);
        assert_eq!(outcome.state, GameState::Resigned(Color::White));
        assert_eq!(outcome.result, Some(GameResult::BlackWins));
        assert_eq!(outcome.plies, 2);
    }

    #[test]
    fn exhausted_input_surfaces_as_input_error() {
        let mut game = Game::new();
        let mut white = Scripted::new(&["e4"]);
        let mut black = Scripted::new(&[]);

        let err = Session::new(&mut game, Seat::Human(&mut white), Seat::Human(&mut black))
            .run()
            .unwrap_err();
        assert!(matches!(err, SessionError::Input(_)));
        assert_eq!(game.record().len(), 1);
    }

    #[test]
    fn empty_clock_forfeits_before_the_move_is_played() {
        let mut game = Game::new();
        let mut white = Scripted::new(&["e4"]);
        let mut black = Scripted::new(&["e5"]);

        let clock = Clock::new(TimeControl::new(Duration::ZERO, Duration::ZERO));
        let outcome = Session::new(&mut game, Seat::Human(&mut white), Seat::Human(&mut black))
            .with_clock(clock)
            .run()
            .unwrap();

        assert_eq!(outcome.state, GameState::TimeForfeit(Color::White));
        assert_eq!(outcome.result, Some(GameResult::BlackWins));
        assert_eq!(outcome.plies, 0);
    }

    #[test]
    fn increment_is_credited_after_each_move() {
        let mut game = Game::new();
        let mut white = Scripted::new(&["e4", "resign"]);
        let mut black = Scripted::new(&["e5"]);
        let control = TimeControl::new(Duration::from_secs(60), Duration::from_secs(5));

        let mut session =
            Session::new(&mut game, Seat::Human(&mut white), Seat::Human(&mut black))
                .with_clock(Clock::new(control));
        session.play_ply().unwrap();
        let white_left = session.clock().unwrap().remaining(Color::White);
        assert!(white_left > Duration::from_secs(60));
        assert!(white_left <= Duration::from_secs(65));
    }

    #[test]
    fn search_limit_budgets() {
        assert_eq!(SearchLimit::Depth(6).budget(), SearchBudget::Depth(6));
        assert_eq!(
            SearchLimit::default().budget(),
            SearchBudget::MoveTime(Duration::from_millis(500))
        );
    }
}
