//! Deterministic UCI engine with scripted misbehaviour.
//!
//! In `normal` mode it plays the legal move that leaves it with the most
//! material, preferring mates. The other modes fail in one specific way so
//! that the client's timeouts, kills and error reporting can be exercised.

use chess_core::{Color, Move, Piece, Square};
use chess_rules::{legal_moves, resolve_uci, Board};
use clap::{Parser, ValueEnum};
use std::thread;
use std::time::Duration;
use uci::{stdio_engine, GuiCommand, InfoBuilder, OptionDecl, OptionKind, UciError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Answers every search with a legal move.
    Normal,
    /// Never answers a search, not even `stop` or `quit`.
    Unresponsive,
    /// Searches until told to `stop`.
    StopResponder,
    /// Answers searches with an illegal move.
    Illegal,
    /// Never completes the `uci` handshake.
    NoHandshake,
    /// Exits as soon as a search starts.
    CrashOnGo,
}

#[derive(Parser)]
#[command(name = "scripted-engine")]
#[command(about = "UCI engine double for arbiter tests")]
struct Args {
    #[arg(long, value_enum, default_value = "normal")]
    mode: Mode,

    /// Thinking time before each answer in normal mode
    #[arg(long, default_value = "0")]
    delay_ms: u64,
}

const MATE: i32 = 100_000;

fn value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight | Piece::Bishop => 300,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 0,
    }
}

/// Material balance from `color`'s side.
fn material(board: &Board, color: Color) -> i32 {
    Square::all()
        .filter_map(|sq| board.piece_at(sq))
        .map(|(piece, owner)| if owner == color { value(piece) } else { -value(piece) })
        .sum()
}

/// Greedy one-ply choice; the first move wins ties.
fn choose(board: &Board) -> Option<(Move, i32)> {
    let me = board.side_to_move();
    let mut best: Option<(Move, i32)> = None;
    for &mv in legal_moves(board).iter() {
        let Ok(after) = board.apply(mv) else {
            continue;
        };
        let score = if after.is_check() && legal_moves(&after).is_empty() {
            MATE
        } else {
            material(&after, me)
        };
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((mv, score));
        }
    }
    best
}

fn set_up(fen: Option<&str>, moves: &[String]) -> Board {
    let mut board = match fen {
        Some(fen) => Board::from_fen(fen).unwrap_or_else(|e| {
            eprintln!("bad fen '{}': {}", fen, e);
            Board::startpos()
        }),
        None => Board::startpos(),
    };
    for text in moves {
        match resolve_uci(&board, text).and_then(|mv| board.apply(mv).ok()) {
            Some(next) => board = next,
            None => {
                eprintln!("ignoring illegal move {}", text);
                break;
            }
        }
    }
    board
}

fn main() -> Result<(), UciError> {
    let args = Args::parse();
    let mut engine = stdio_engine();
    let mut board = Board::startpos();
    let mut searching = false;

    loop {
        let cmd = match engine.read_command() {
            Ok(cmd) => cmd,
            Err(UciError::Eof) => return Ok(()),
            Err(e) => {
                eprintln!("Error reading command: {}", e);
                continue;
            }
        };

        if args.mode == Mode::NoHandshake {
            if cmd == GuiCommand::Quit {
                return Ok(());
            }
            continue;
        }

        match cmd {
            GuiCommand::Uci => {
                engine.send_id(&format!("Scripted {:?}", args.mode), "arbiter")?;
                engine.send_option(OptionDecl::spin("Hash", 16, 1, 1024))?;
                engine.send_option(OptionDecl::spin("Threads", 1, 1, 64))?;
                engine.send_option(OptionDecl::spin("Skill Level", 20, 0, 20))?;
                engine.send_option(OptionDecl::check("Ponder", false))?;
                engine.send_option(OptionDecl::new("Clear Hash", OptionKind::Button))?;
                engine.send_uciok()?;
            }

            GuiCommand::IsReady => engine.send_readyok()?,

            GuiCommand::SetOption { name, value } => {
                eprintln!("option {} = {:?}", name, value);
            }

            GuiCommand::UciNewGame => board = Board::startpos(),

            GuiCommand::Position { fen, moves } => board = set_up(fen.as_deref(), &moves),

            GuiCommand::Go(opts) => match args.mode {
                Mode::Unresponsive => loop {
                    thread::sleep(Duration::from_secs(3600));
                },
                Mode::CrashOnGo => std::process::exit(3),
                Mode::Illegal => engine.send_bestmove("a1h8")?,
                Mode::StopResponder => searching = true,
                Mode::Normal | Mode::NoHandshake => {
                    thread::sleep(Duration::from_millis(args.delay_ms));
                    match choose(&board) {
                        Some((mv, score)) => {
                            let info = InfoBuilder::new()
                                .depth(opts.depth.unwrap_or(1))
                                .score_cp(score.clamp(-5_000, 5_000))
                                .nodes(legal_moves(&board).len() as u64)
                                .pv(vec![mv.to_uci()])
                                .build();
                            engine.send_info(info)?;
                            engine.send_bestmove(&mv.to_uci())?;
                        }
                        None => engine.send_bestmove("0000")?,
                    }
                }
            },

            GuiCommand::Stop => {
                if searching {
                    searching = false;
                    let mv = choose(&board).map_or("0000".to_string(), |(mv, _)| mv.to_uci());
                    engine.send_bestmove(&mv)?;
                }
            }

            GuiCommand::Quit => return Ok(()),

            GuiCommand::Unknown(_) => {}
        }
    }
}
