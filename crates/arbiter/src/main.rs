use anyhow::{anyhow, Context};
use arbiter::{
    AnalysisConfig, ArbiterConfig, Clock, EngineConfig, EngineSeat, GameAnalyzer, HumanAction,
    HumanPlayer, PgnHeaders, Seat, Session, SessionOutcome, UciClient,
};
use chess_core::{Color, Square};
use chess_rules::{move_to_san, Board, Game, GameError, GameResult};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arbiter")]
#[command(about = "Plays chess games between humans and UCI engines")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "arbiter.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play against an engine from the terminal
    Play {
        /// Engine name from the config, or a path to an engine binary
        #[arg(short, long)]
        engine: String,
        /// Your color
        #[arg(short, long, value_enum, default_value = "white")]
        color: Side,
        /// Start from this FEN instead of the standard position
        #[arg(long)]
        fen: Option<String>,
        /// Write the finished game to this PGN file
        #[arg(long)]
        pgn: Option<PathBuf>,
    },
    /// Run games between two engines
    Match {
        /// White engine name or path
        #[arg(short, long)]
        white: String,
        /// Black engine name or path
        #[arg(short, long)]
        black: String,
        /// Number of games to play
        #[arg(short, long, default_value = "1")]
        games: u32,
        /// Games played at the same time
        #[arg(long, default_value = "1")]
        concurrency: u32,
        /// Directory to write one PGN file per game
        #[arg(long)]
        pgn_dir: Option<PathBuf>,
        /// Print one JSON object per game instead of text
        #[arg(long)]
        json: bool,
    },
    /// Classify the moves of a game with an engine
    Analyse {
        /// Engine name or path
        #[arg(short, long)]
        engine: String,
        /// Start position of the game
        #[arg(long)]
        fen: Option<String>,
        /// Read the game from this PGN file instead of the command line
        #[arg(long, conflicts_with_all = ["fen", "moves"])]
        pgn_in: Option<PathBuf>,
        /// Which game of the PGN file to analyse, counting from 1
        #[arg(long, requires = "pgn_in")]
        game: Option<usize>,
        /// Search depth per position
        #[arg(short, long, default_value = "15")]
        depth: u32,
        /// Write the annotated game to this PGN file
        #[arg(long)]
        pgn: Option<PathBuf>,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
        /// Moves in coordinate notation or SAN
        moves: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Side {
    White,
    Black,
}

impl Side {
    fn color(self) -> Color {
        match self {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = ArbiterConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Play {
            engine,
            color,
            fen,
            pgn,
        } => play(&config, &engine, color.color(), fen.as_deref(), pgn),
        Commands::Match {
            white,
            black,
            games,
            concurrency,
            pgn_dir,
            json,
        } => run_match(
            &config,
            &MatchPlan {
                white,
                black,
                games,
                concurrency,
                pgn_dir,
                json,
            },
        ),
        Commands::Analyse {
            engine,
            fen,
            pgn_in,
            game,
            depth,
            pgn,
            json,
            moves,
        } => {
            let source = match pgn_in {
                Some(path) => GameSource::Pgn {
                    path,
                    number: game.unwrap_or(1),
                },
                None => GameSource::Moves { fen, moves },
            };
            analyse(&config, &engine, source, depth, pgn, json)
        }
    }
}

/// 0 draw, 2 White wins, 3 Black wins; an unfinished game counts as an error.
fn exit_code(result: Option<GameResult>) -> ExitCode {
    match result {
        Some(GameResult::Draw) => ExitCode::SUCCESS,
        Some(GameResult::WhiteWins) => ExitCode::from(2),
        Some(GameResult::BlackWins) => ExitCode::from(3),
        None => ExitCode::from(1),
    }
}

fn start_engine(config: &ArbiterConfig, engine: &EngineConfig) -> anyhow::Result<UciClient> {
    UciClient::start(
        &engine.path,
        &engine.option_pairs(),
        &config.limits.engine_limits(),
    )
    .with_context(|| format!("starting {}", engine.path.display()))
}

fn new_game(fen: Option<&str>) -> anyhow::Result<Game> {
    match fen {
        Some(fen) => Game::from_fen(fen).with_context(|| format!("invalid FEN '{}'", fen)),
        None => Ok(Game::new()),
    }
}

fn play(
    config: &ArbiterConfig,
    engine: &str,
    color: Color,
    fen: Option<&str>,
    pgn: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let engine_config = config.resolve_engine(engine)?;
    let mut client = start_engine(config, &engine_config)?;
    let engine_name = client.name().unwrap_or(engine).to_string();
    info!("playing {} as {}", engine_name, color.opposite());

    let mut game = new_game(fen)?;
    let mut human = StdinPlayer::new(color);
    let outcome = {
        let you = Seat::Human(&mut human);
        let them = Seat::Engine(EngineSeat {
            client: &mut client,
            limit: engine_config.search.limit(),
        });
        let (white, black) = match color {
            Color::White => (you, them),
            Color::Black => (them, you),
        };
        let mut session =
            Session::new(&mut game, white, black).with_restart_limit(config.limits.restart_limit);
        if let Some(tc) = config.time_control {
            session = session.with_clock(Clock::new(tc.time_control()));
        }
        session.run()?
    };
    client.stop();

    println!("{}", outcome.state);
    if let Some(path) = pgn {
        let headers = match color {
            Color::White => PgnHeaders::players("Human", &engine_name),
            Color::Black => PgnHeaders::players(&engine_name, "Human"),
        };
        arbiter::write_pgn(&path, &game, &headers, None)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(exit_code(outcome.result))
}

struct MatchPlan {
    white: String,
    black: String,
    games: u32,
    concurrency: u32,
    pgn_dir: Option<PathBuf>,
    json: bool,
}

#[derive(Debug, Serialize)]
struct GameReport {
    game: u32,
    white: String,
    black: String,
    #[serde(flatten)]
    outcome: SessionOutcome,
    moves: Vec<String>,
}

fn play_engine_game(
    config: &ArbiterConfig,
    white: &EngineConfig,
    black: &EngineConfig,
) -> anyhow::Result<(Game, SessionOutcome)> {
    let mut white_client = start_engine(config, white)?;
    let mut black_client = start_engine(config, black)?;
    let mut game = Game::new();
    let outcome = {
        let mut session = Session::new(
            &mut game,
            Seat::Engine(EngineSeat {
                client: &mut white_client,
                limit: white.search.limit(),
            }),
            Seat::Engine(EngineSeat {
                client: &mut black_client,
                limit: black.search.limit(),
            }),
        )
        .with_restart_limit(config.limits.restart_limit);
        if let Some(tc) = config.time_control {
            session = session.with_clock(Clock::new(tc.time_control()));
        }
        session.run()?
    };
    white_client.stop();
    black_client.stop();
    Ok((game, outcome))
}

fn run_match(config: &ArbiterConfig, plan: &MatchPlan) -> anyhow::Result<ExitCode> {
    let white = config.resolve_engine(&plan.white)?;
    let black = config.resolve_engine(&plan.black)?;
    if let Some(dir) = &plan.pgn_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let workers = plan.concurrency.clamp(1, plan.games.max(1));
    info!(
        "running {} games: {} vs {} ({} at a time)",
        plan.games, plan.white, plan.black, workers
    );

    let next = AtomicU32::new(1);
    let mut results = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let (next, white, black) = (&next, &white, &black);
                s.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let number = next.fetch_add(1, Ordering::Relaxed);
                        if number > plan.games {
                            break done;
                        }
                        done.push((number, play_engine_game(config, white, black)));
                    }
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.extend(
                handle
                    .join()
                    .map_err(|_| anyhow!("match worker panicked"))?,
            );
        }
        Ok::<_, anyhow::Error>(results)
    })?;
    results.sort_by_key(|(number, _)| *number);

    let (mut white_wins, mut black_wins, mut draws, mut failures) = (0, 0, 0, 0);
    for (number, result) in results {
        let (game, outcome) = match result {
            Ok(played) => played,
            Err(e) => {
                error!("game {} failed: {:#}", number, e);
                failures += 1;
                continue;
            }
        };
        match outcome.result {
            Some(GameResult::WhiteWins) => white_wins += 1,
            Some(GameResult::BlackWins) => black_wins += 1,
            Some(GameResult::Draw) => draws += 1,
            None => {}
        }

        if let Some(dir) = &plan.pgn_dir {
            let headers = PgnHeaders {
                round: number.to_string(),
                ..PgnHeaders::players(&plan.white, &plan.black)
            };
            let path = dir.join(format!("game-{:03}.pgn", number));
            arbiter::write_pgn(&path, &game, &headers, None)
                .with_context(|| format!("writing {}", path.display()))?;
        }

        let report = GameReport {
            game: number,
            white: plan.white.clone(),
            black: plan.black.clone(),
            moves: game.uci_moves(),
            outcome,
        };
        if plan.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!(
                "Game {}: {} ({}, {} plies)",
                report.game,
                report.outcome.result.map_or("*", GameResult::pgn_token),
                report.outcome.state,
                report.outcome.plies
            );
        }
    }

    if !plan.json {
        println!(
            "\n{} vs {}: +{} ={} -{}",
            plan.white, plan.black, white_wins, draws, black_wins
        );
    }

    Ok(if failures > 0 {
        ExitCode::from(1)
    } else if white_wins > black_wins {
        ExitCode::from(2)
    } else if black_wins > white_wins {
        ExitCode::from(3)
    } else {
        ExitCode::SUCCESS
    })
}

/// Where `analyse` takes its game from.
enum GameSource {
    Moves {
        fen: Option<String>,
        moves: Vec<String>,
    },
    Pgn {
        path: PathBuf,
        number: usize,
    },
}

impl GameSource {
    /// The game to analyse and, for PGN input, its original tags.
    fn load(self) -> anyhow::Result<(Game, Option<PgnHeaders>)> {
        match self {
            GameSource::Moves { fen, moves } => {
                let mut game = new_game(fen.as_deref())?;
                for text in &moves {
                    let mv = game.parse_move(text)?;
                    game.submit_move(mv)?;
                }
                Ok((game, None))
            }
            GameSource::Pgn { path, number } => {
                let mut games = arbiter::read_pgn_file(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let count = games.len();
                if number == 0 || number > count {
                    return Err(anyhow!(
                        "{} holds {} game(s), there is no game {}",
                        path.display(),
                        count,
                        number
                    ));
                }
                let pgn = games.swap_remove(number - 1);
                let tag = |name: &str| pgn.tag(name).unwrap_or("?");
                info!(
                    event = tag("Event"),
                    date = tag("Date"),
                    result = tag("Result"),
                    opening = tag("Opening"),
                    "{} ({}) vs {} ({})",
                    tag("White"),
                    tag("WhiteElo"),
                    tag("Black"),
                    tag("BlackElo")
                );
                let headers = pgn.headers();
                Ok((pgn.game, Some(headers)))
            }
        }
    }
}

fn analyse(
    config: &ArbiterConfig,
    engine: &str,
    source: GameSource,
    depth: u32,
    pgn: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let (game, read_headers) = source.load()?;

    let engine_config = config.resolve_engine(engine)?;
    let mut client = start_engine(config, &engine_config)?;
    let engine_name = client.name().unwrap_or(engine).to_string();
    let analysis = GameAnalyzer::new(&mut client, AnalysisConfig { depth }).analyse_game(&game)?;
    client.stop();

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        for m in &analysis.moves {
            println!(
                "{:>3}. {:<8} {:>6} -> {:>6}  loss {:>4}  {:?}{}",
                m.ply,
                m.san,
                m.eval_before,
                m.eval_after,
                m.cp_loss,
                m.quality,
                m.best_move
                    .as_deref()
                    .filter(|best| *best != m.uci)
                    .map(|best| format!(" (best {})", best))
                    .unwrap_or_default()
            );
        }
        for (side, stats) in [("White", &analysis.white), ("Black", &analysis.black)] {
            println!(
                "{}: {} moves, avg loss {:.1} cp, accuracy {:.1}%, {} inaccuracies, {} mistakes, {} blunders",
                side,
                stats.total_moves,
                stats.avg_cp_loss,
                stats.accuracy_percent,
                stats.inaccuracies,
                stats.mistakes,
                stats.blunders
            );
        }
    }

    if let Some(path) = pgn {
        let headers = read_headers.unwrap_or_else(|| PgnHeaders {
            event: format!("Analysis by {}", engine_name),
            ..PgnHeaders::default()
        });
        arbiter::write_pgn(&path, &game, &headers, Some(&analysis))
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// A human at the terminal. Accepts coordinate notation, SAN, `moves` to
/// list the legal moves and `resign`.
struct StdinPlayer {
    color: Color,
    input: io::StdinLock<'static>,
}

impl StdinPlayer {
    fn new(color: Color) -> Self {
        Self {
            color,
            input: io::stdin().lock(),
        }
    }
}

impl HumanPlayer for StdinPlayer {
    fn choose(&mut self, game: &Game) -> io::Result<HumanAction> {
        let mut out = io::stdout().lock();
        write!(out, "{}", render_board(game.board(), self.color))?;
        if game.is_check() {
            writeln!(out, "Check!")?;
        }
        loop {
            write!(out, "{} to move> ", game.side_to_move())?;
            out.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
            }
            match line.trim() {
                "" => continue,
                "resign" => return Ok(HumanAction::Resign),
                "moves" => {
                    let board = game.board();
                    let sans: Vec<String> = game
                        .legal_moves()
                        .iter()
                        .map(|m| move_to_san(board, *m))
                        .collect();
                    writeln!(out, "{}", sans.join(" "))?;
                }
                text => return Ok(HumanAction::Move(text.to_string())),
            }
        }
    }

    fn rejected(&mut self, input: &str, error: &GameError) {
        println!("Cannot play '{}': {}", input, error);
    }

    fn observe(&mut self, game: &Game) {
        if let Some(entry) = game.record().last() {
            if entry.board_before.side_to_move() != self.color {
                println!("{} plays {}", entry.board_before.side_to_move(), entry.san);
            }
        }
    }
}

/// Text diagram of `board` seen from `perspective`'s side.
fn render_board(board: &Board, perspective: Color) -> String {
    let ranks: Vec<i8> = match perspective {
        Color::White => (0..8).rev().collect(),
        Color::Black => (0..8).collect(),
    };
    let files: Vec<i8> = match perspective {
        Color::White => (0..8).collect(),
        Color::Black => (0..8).rev().collect(),
    };

    let mut out = String::new();
    for &rank in &ranks {
        out.push_str(&format!("{} ", rank + 1));
        for &file in &files {
            let c = Square::from_coords(file, rank)
                .and_then(|sq| board.piece_at(sq))
                .map_or('.', |(piece, color)| piece.to_fen_char(color));
            out.push(' ');
            out.push(c);
        }
        out.push('\n');
    }
    out.push_str("  ");
    for &file in &files {
        out.push(' ');
        out.push((b'a' + file as u8) as char);
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses_play_command() {
        let cli = Cli::try_parse_from(["arbiter", "play", "--engine", "stockfish", "-c", "black"]);
        assert!(cli.is_ok());

        let cli = cli.unwrap();
        assert_eq!(cli.config, PathBuf::from("arbiter.toml"));
        match cli.command {
            Commands::Play {
                engine, color, pgn, ..
            } => {
                assert_eq!(engine, "stockfish");
                assert_eq!(color, Side::Black);
                assert!(pgn.is_none());
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn test_cli_parses_match_command_with_defaults() {
        let cli = Cli::try_parse_from(["arbiter", "match", "-w", "a", "-b", "b"]).unwrap();
        match cli.command {
            Commands::Match {
                white,
                black,
                games,
                concurrency,
                pgn_dir,
                json,
            } => {
                assert_eq!(white, "a");
                assert_eq!(black, "b");
                assert_eq!(games, 1);
                assert_eq!(concurrency, 1);
                assert!(pgn_dir.is_none());
                assert!(!json);
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn test_cli_parses_match_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "arbiter",
            "--config",
            "other.toml",
            "match",
            "--white",
            "a",
            "--black",
            "b",
            "-g",
            "8",
            "--concurrency",
            "4",
            "--pgn-dir",
            "out",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        match cli.command {
            Commands::Match {
                games,
                concurrency,
                pgn_dir,
                json,
                ..
            } => {
                assert_eq!(games, 8);
                assert_eq!(concurrency, 4);
                assert_eq!(pgn_dir, Some(PathBuf::from("out")));
                assert!(json);
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn test_cli_parses_analyse_moves() {
        let cli = Cli::try_parse_from([
            "arbiter", "analyse", "-e", "sf", "--depth", "8", "e2e4", "e5", "Nf3",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyse {
                engine,
                depth,
                moves,
                fen,
                ..
            } => {
                assert_eq!(engine, "sf");
                assert_eq!(depth, 8);
                assert_eq!(moves, vec!["e2e4", "e5", "Nf3"]);
                assert!(fen.is_none());
            }
            _ => panic!("expected analyse"),
        }
    }

    #[test]
    fn test_cli_parses_analyse_pgn_input() {
        let cli = Cli::try_parse_from([
            "arbiter", "analyse", "-e", "sf", "--pgn-in", "games.pgn", "--game", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyse {
                pgn_in, game, moves, ..
            } => {
                assert_eq!(pgn_in, Some(PathBuf::from("games.pgn")));
                assert_eq!(game, Some(3));
                assert!(moves.is_empty());
            }
            _ => panic!("expected analyse"),
        }

        assert!(Cli::try_parse_from(["arbiter", "analyse", "-e", "sf", "--game", "2"]).is_err());
        assert!(Cli::try_parse_from([
            "arbiter", "analyse", "-e", "sf", "--pgn-in", "g.pgn", "e2e4"
        ])
        .is_err());
    }

    #[test]
    fn test_pgn_source_picks_the_numbered_game() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pgn");
        std::fs::write(
            &path,
            "[White \"A\"]\n[Result \"*\"]\n\n1. e4 *\n\n[White \"B\"]\n[Result \"*\"]\n\n1. d4 d5 *\n",
        )
        .unwrap();

        let source = GameSource::Pgn {
            path: path.clone(),
            number: 2,
        };
        let (game, headers) = source.load().unwrap();
        assert_eq!(game.uci_moves(), vec!["d2d4", "d7d5"]);
        assert_eq!(headers.map(|h| h.white), Some("B".to_string()));

        let missing = GameSource::Pgn { path, number: 3 };
        assert!(missing.load().is_err());
    }

    #[test]
    fn test_cli_rejects_missing_engine() {
        assert!(Cli::try_parse_from(["arbiter", "play"]).is_err());
        assert!(Cli::try_parse_from(["arbiter", "match", "-w", "a"]).is_err());
    }

    #[test]
    fn test_cli_help_lists_commands() {
        let mut cmd = Cli::command();
        let help = cmd.render_help().to_string();
        assert!(help.contains("play"));
        assert!(help.contains("match"));
        assert!(help.contains("analyse"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(Some(GameResult::Draw)), ExitCode::SUCCESS);
        assert_eq!(exit_code(Some(GameResult::WhiteWins)), ExitCode::from(2));
        assert_eq!(exit_code(Some(GameResult::BlackWins)), ExitCode::from(3));
        assert_eq!(exit_code(None), ExitCode::from(1));
    }

    #[test]
    fn test_board_diagram_follows_perspective() {
        let board = Board::startpos();
        let white = render_board(&board, Color::White);
        assert!(white.starts_with("8  r n b q k b n r\n"));
        assert!(white.ends_with("   a b c d e f g h\n"));

        let black = render_board(&board, Color::Black);
        assert!(black.starts_with("1  R N B K Q B N R\n"));
        assert!(black.ends_with("   h g f e d c b a\n"));
    }
}
