//! Engine-backed game analysis with move quality classification.
//!
//! Every position of a game is evaluated at a fixed depth. The drop in
//! evaluation caused by a move, seen from the mover's side, is its
//! centipawn loss, which determines its [`MoveQuality`].

use crate::uci_client::{EngineError, UciClient};
use chess_core::Color;
use chess_rules::{legal_moves, Board, Game};
use serde::Serialize;
use tracing::debug;

/// Value of a mate on the centipawn scale; mate in `n` scores `MATE_SCORE - n`.
pub const MATE_SCORE: i32 = 10_000;

/// Classification of move quality based on centipawn loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MoveQuality {
    /// The engine's own choice, or no loss at all
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveQuality {
    pub fn from_cp_loss(cp_loss: i32, engine_choice: bool) -> Self {
        match cp_loss {
            _ if engine_choice => MoveQuality::Best,
            i32::MIN..=0 => MoveQuality::Best,
            1..=10 => MoveQuality::Excellent,
            11..=50 => MoveQuality::Good,
            51..=100 => MoveQuality::Inaccuracy,
            101..=300 => MoveQuality::Mistake,
            _ => MoveQuality::Blunder,
        }
    }

    /// PGN annotation for weak moves.
    pub fn pgn_suffix(self) -> Option<&'static str> {
        match self {
            MoveQuality::Inaccuracy => Some("?!"),
            MoveQuality::Mistake => Some("?"),
            MoveQuality::Blunder => Some("??"),
            _ => None,
        }
    }
}

/// Analysis result for a single move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveAnalysis {
    pub ply: usize,
    pub color: Color,
    pub san: String,
    pub uci: String,
    /// The engine's preferred move in the position before.
    pub best_move: Option<String>,
    /// Evaluations in centipawns from White's point of view.
    pub eval_before: i32,
    pub eval_after: i32,
    pub cp_loss: i32,
    pub quality: MoveQuality,
}

/// Statistics for one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerStats {
    pub total_moves: u32,
    pub best_moves: u32,
    pub excellent_moves: u32,
    pub good_moves: u32,
    pub inaccuracies: u32,
    pub mistakes: u32,
    pub blunders: u32,
    pub avg_cp_loss: f64,
    /// 0-100, decaying exponentially with the average centipawn loss.
    pub accuracy_percent: f64,
}

impl PlayerStats {
    pub fn from_moves<'m>(moves: impl IntoIterator<Item = &'m MoveAnalysis>) -> Self {
        let mut stats = PlayerStats::default();
        let mut total_loss = 0i64;
        for m in moves {
            stats.total_moves += 1;
            total_loss += i64::from(m.cp_loss);
            match m.quality {
                MoveQuality::Best => stats.best_moves += 1,
                MoveQuality::Excellent => stats.excellent_moves += 1,
                MoveQuality::Good => stats.good_moves += 1,
                MoveQuality::Inaccuracy => stats.inaccuracies += 1,
                MoveQuality::Mistake => stats.mistakes += 1,
                MoveQuality::Blunder => stats.blunders += 1,
            }
        }
        if stats.total_moves > 0 {
            stats.avg_cp_loss = total_loss as f64 / f64::from(stats.total_moves);
            stats.accuracy_percent = 100.0 * (-stats.avg_cp_loss / 100.0).exp();
        } else {
            stats.accuracy_percent = 100.0;
        }
        stats
    }
}

/// Complete analysis of a game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameAnalysis {
    pub moves: Vec<MoveAnalysis>,
    pub white: PlayerStats,
    pub black: PlayerStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Search depth per position.
    pub depth: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { depth: 15 }
    }
}

/// Evaluation of one position from White's point of view.
#[derive(Debug, Clone, PartialEq)]
struct PositionEval {
    white_cp: i32,
    best_move: Option<String>,
}

/// Analyses games with a running engine.
pub struct GameAnalyzer<'a> {
    client: &'a mut UciClient,
    config: AnalysisConfig,
}

impl<'a> GameAnalyzer<'a> {
    pub fn new(client: &'a mut UciClient, config: AnalysisConfig) -> Self {
        Self { client, config }
    }

    /// Evaluates every position of `game` and classifies each move.
    pub fn analyse_game(&mut self, game: &Game) -> Result<GameAnalysis, EngineError> {
        self.client.new_game()?;

        let mut boards: Vec<&Board> = game.record().iter().map(|e| &e.board_before).collect();
        boards.push(game.board());

        let mut evals = Vec::with_capacity(boards.len());
        for board in &boards {
            evals.push(self.evaluate(board)?);
        }

        let moves: Vec<MoveAnalysis> = game
            .record()
            .iter()
            .enumerate()
            .map(|(ply, entry)| {
                let color = entry.board_before.side_to_move();
                let before = &evals[ply];
                let after = &evals[ply + 1];
                let uci = entry.mov.to_uci();
                let engine_choice = before.best_move.as_deref() == Some(uci.as_str());
                let cp_loss = cp_loss(color, before.white_cp, after.white_cp);
                MoveAnalysis {
                    ply: ply + 1,
                    color,
                    san: entry.san.clone(),
                    uci,
                    best_move: before.best_move.clone(),
                    eval_before: before.white_cp,
                    eval_after: after.white_cp,
                    cp_loss,
                    quality: MoveQuality::from_cp_loss(cp_loss, engine_choice),
                }
            })
            .collect();

        let white = PlayerStats::from_moves(moves.iter().filter(|m| m.color == Color::White));
        let black = PlayerStats::from_moves(moves.iter().filter(|m| m.color == Color::Black));
        Ok(GameAnalysis {
            moves,
            white,
            black,
        })
    }

    fn evaluate(&mut self, board: &Board) -> Result<PositionEval, EngineError> {
        // Finished positions are scored without asking the engine.
        if legal_moves(board).is_empty() {
            let mover_cp = if board.is_check() { -MATE_SCORE } else { 0 };
            return Ok(PositionEval {
                white_cp: white_relative(board.side_to_move(), mover_cp),
                best_move: None,
            });
        }

        let analysis = self.client.analyse(board, self.config.depth)?;
        let mover_cp = analysis
            .score
            .map_or(0, |score| score.to_centipawns(MATE_SCORE));
        debug!(fen = %board.to_fen(), cp = mover_cp, "position evaluated");
        Ok(PositionEval {
            white_cp: white_relative(board.side_to_move(), mover_cp),
            best_move: analysis.best_move.map(|m| m.to_uci()),
        })
    }
}

fn white_relative(side_to_move: Color, cp: i32) -> i32 {
    match side_to_move {
        Color::White => cp,
        Color::Black => -cp,
    }
}

/// How much the mover's evaluation dropped, never negative.
fn cp_loss(mover: Color, before: i32, after: i32) -> i32 {
    let drop = match mover {
        Color::White => before - after,
        Color::Black => after - before,
    };
    drop.max(0)
}
