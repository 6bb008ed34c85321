//! PGN (Portable Game Notation) import and export.
//!
//! Games are written with the seven-tag roster, SAN move text wrapped at 80
//! columns and the result token. Games that did not start from the standard
//! position also carry `SetUp`/`FEN` tags.
//!
//! Reading replays the main line of each game through [`Game`], so every
//! imported move is legal. Comments, NAGs and variations are skipped.

use crate::analysis::{GameAnalysis, MoveAnalysis};
use chess_core::Color;
use chess_rules::{Board, BoardError, Game, GameError, GameState};
use chrono::{Local, NaiveDate};
use pgn_reader::{BufferedReader, RawHeader, SanPlus, Skip, Visitor};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const LINE_WIDTH: usize = 80;

/// Tag values for the seven-tag roster. `Result` comes from the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnHeaders {
    pub event: String,
    pub site: String,
    pub date: NaiveDate,
    pub round: String,
    pub white: String,
    pub black: String,
}

impl Default for PgnHeaders {
    fn default() -> Self {
        Self {
            event: "Arbiter Match".to_string(),
            site: "local".to_string(),
            date: Local::now().date_naive(),
            round: "1".to_string(),
            white: "?".to_string(),
            black: "?".to_string(),
        }
    }
}

impl PgnHeaders {
    pub fn players(white: &str, black: &str) -> Self {
        Self {
            white: white.to_string(),
            black: black.to_string(),
            ..Self::default()
        }
    }
}

fn result_token(state: GameState) -> &'static str {
    state.result().map_or("*", |r| r.pgn_token())
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders `game` as PGN.
///
/// With `analysis`, weak moves get a `?!`, `?` or `??` suffix and every
/// move a `{before -> after (loss)}` comment, evaluations in pawns from
/// White's side.
pub fn to_pgn(game: &Game, headers: &PgnHeaders, analysis: Option<&GameAnalysis>) -> String {
    let result = result_token(game.state());
    let mut out = String::new();

    let mut tag = |name: &str, value: &str| {
        out.push_str(&format!("[{} \"{}\"]\n", name, escape(value)));
    };
    tag("Event", &headers.event);
    tag("Site", &headers.site);
    tag("Date", &headers.date.format("%Y.%m.%d").to_string());
    tag("Round", &headers.round);
    tag("White", &headers.white);
    tag("Black", &headers.black);
    tag("Result", result);

    let start = game.start_board();
    if start != &Board::startpos() {
        tag("SetUp", "1");
        tag("FEN", &start.to_fen());
    }
    if let GameState::TimeForfeit(_) = game.state() {
        tag("Termination", "time forfeit");
    }
    out.push('\n');

    let mut tokens = Vec::with_capacity(game.record().len() * 3 / 2 + 1);
    for (i, entry) in game.record().iter().enumerate() {
        let board = &entry.board_before;
        let number = board.fullmove_number();
        match board.side_to_move() {
            Color::White => tokens.push(format!("{}.", number)),
            Color::Black if i == 0 => tokens.push(format!("{}...", number)),
            Color::Black => {}
        }
        let annotation = analysis.and_then(|a| a.moves.get(i));
        let suffix = annotation
            .and_then(|m| m.quality.pgn_suffix())
            .unwrap_or("");
        tokens.push(format!("{}{}", entry.san, suffix));
        if let Some(m) = annotation {
            tokens.push(comment(m));
        }
    }
    tokens.push(result.to_string());

    out.push_str(&wrap(tokens));
    out
}

fn comment(m: &MoveAnalysis) -> String {
    let pawns = |cp: i32| f64::from(cp) / 100.0;
    let label = match m.quality.pgn_suffix() {
        Some(_) => format!("{:?}. ", m.quality),
        None => String::new(),
    };
    format!(
        "{{{}{:.2} -> {:.2} ({:.2})}}",
        label,
        pawns(m.eval_before),
        pawns(m.eval_after),
        pawns(-m.cp_loss)
    )
}

/// Joins tokens with single spaces, breaking lines before they pass 80 columns.
fn wrap(tokens: impl IntoIterator<Item = String>) -> String {
    let mut out = String::new();
    let mut line = String::new();
    for token in tokens {
        if !line.is_empty() && line.len() + 1 + token.len() > LINE_WIDTH {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&token);
    }
    out.push_str(&line);
    out.push('\n');
    out
}

/// Writes `game` as a PGN file at `path`.
pub fn write_pgn<P: AsRef<Path>>(
    path: P,
    game: &Game,
    headers: &PgnHeaders,
    analysis: Option<&GameAnalysis>,
) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(to_pgn(game, headers, analysis).as_bytes())?;
    Ok(())
}

#[derive(Error, Debug)]
pub enum PgnError {
    #[error("failed to read PGN: {0}")]
    Io(#[from] io::Error),

    #[error("invalid FEN tag: {0}")]
    Fen(#[from] BoardError),

    #[error("result does not fit the moves: {0}")]
    Result(#[from] GameError),

    #[error("game {game}, move {ply} ({san}): {source}")]
    Move {
        game: usize,
        ply: usize,
        san: String,
        #[source]
        source: GameError,
    },
}

/// A game read from PGN: its tag pairs in file order and the replayed main line.
#[derive(Debug, Clone)]
pub struct PgnGame {
    pub tags: Vec<(String, String)>,
    pub game: Game,
}

impl PgnGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The seven-tag roster, for writing the game back out.
    pub fn headers(&self) -> PgnHeaders {
        let defaults = PgnHeaders::default();
        let text = |name: &str, default: String| {
            self.tag(name).map_or(default, str::to_string)
        };
        PgnHeaders {
            event: text("Event", defaults.event),
            site: text("Site", defaults.site),
            date: self
                .tag("Date")
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y.%m.%d").ok())
                .unwrap_or(defaults.date),
            round: text("Round", defaults.round),
            white: text("White", defaults.white),
            black: text("Black", defaults.black),
        }
    }
}

/// Tags and main-line SAN of one game, before replay.
#[derive(Default)]
struct RawGame {
    tags: Vec<(String, String)>,
    sans: Vec<String>,
}

impl Visitor for RawGame {
    type Result = RawGame;

    fn begin_game(&mut self) {
        self.tags.clear();
        self.sans.clear();
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        self.tags.push((
            String::from_utf8_lossy(key).into_owned(),
            value.decode_utf8_lossy().into_owned(),
        ));
    }

    fn san(&mut self, san_plus: SanPlus) {
        self.sans.push(san_plus.san.to_string());
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true)
    }

    fn end_game(&mut self) -> Self::Result {
        std::mem::take(self)
    }
}

impl RawGame {
    /// Plays the moves from the `FEN` tag or the standard start. A decisive
    /// `Result` on an unfinished board is recorded as a resignation, or as a
    /// time forfeit when `Termination` says so.
    fn replay(self, number: usize) -> Result<PgnGame, PgnError> {
        let tag = |name: &str| {
            self.tags
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        let mut game = match tag("FEN") {
            Some(fen) => Game::from_fen(fen)?,
            None => Game::new(),
        };
        for (i, san) in self.sans.iter().enumerate() {
            game.submit_san(san).map_err(|source| PgnError::Move {
                game: number,
                ply: i + 1,
                san: san.clone(),
                source,
            })?;
        }

        if !game.state().is_terminal() {
            let loser = match tag("Result") {
                Some("1-0") => Some(Color::Black),
                Some("0-1") => Some(Color::White),
                _ => None,
            };
            if let Some(loser) = loser {
                let on_time = tag("Termination").is_some_and(|t| t.eq_ignore_ascii_case("time forfeit"));
                if on_time {
                    game.forfeit_on_time(loser)?;
                } else {
                    game.resign(loser)?;
                }
            }
        }

        debug!(
            game = number,
            plies = game.record().len(),
            "read {} vs {}",
            tag("White").unwrap_or("?"),
            tag("Black").unwrap_or("?")
        );
        Ok(PgnGame {
            tags: self.tags,
            game,
        })
    }
}

/// Reads every game from PGN text.
pub fn read_games<R: Read>(source: R) -> Result<Vec<PgnGame>, PgnError> {
    let mut reader = BufferedReader::new(source);
    let mut visitor = RawGame::default();
    let mut games = Vec::new();
    while let Some(raw) = reader.read_game(&mut visitor)? {
        games.push(raw.replay(games.len() + 1)?);
    }
    Ok(games)
}

/// Reads every game from a PGN file.
pub fn read_pgn_file<P: AsRef<Path>>(path: P) -> Result<Vec<PgnGame>, PgnError> {
    read_games(File::open(path)?)
}
