//! UCI (Universal Chess Interface) wire vocabulary.
//!
//! Both directions of the protocol are covered: [`GuiCommand`] for what a
//! controller sends, [`EngineMessage`] for what an engine answers. Each type
//! can be parsed from and formatted to a single protocol line.
//!
//! # Commands
//!
//! - `uci` / `uciok` - Initialize engine, get id and options
//! - `isready` / `readyok` - Synchronization
//! - `setoption name <name> [value <value>]` - Configure the engine
//! - `ucinewgame` - Forget the previous game
//! - `position startpos|fen <fen> [moves <move>...]` - Set position
//! - `go [wtime ..] [btime ..] [winc ..] [binc ..] [movetime <ms>] [depth <d>]` - Start search
//! - `stop` / `bestmove` - End search
//! - `quit` - Exit engine

mod command;
mod info;
mod option;

pub use command::{GoOptions, GuiCommand};
pub use info::{Bound, EngineInfo, InfoBuilder, Score};
pub use option::{OptionDecl, OptionKind};

use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Input closed")]
    Eof,
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// Declared option.
    Option(OptionDecl),
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found. `mv` is kept as sent; `0000` and `(none)` mean no move.
    BestMove { mv: String, ponder: Option<String> },
    /// Anything else; engines may print free text.
    Unknown(String),
}

impl EngineMessage {
    /// Parse a single line received from an engine.
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let line = line.trim();
        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (line, ""),
        };

        match keyword {
            "uciok" => Ok(EngineMessage::UciOk),
            "readyok" => Ok(EngineMessage::ReadyOk),
            "id" => match rest.split_once(char::is_whitespace) {
                Some(("name", value)) => Ok(EngineMessage::Id {
                    name: Some(value.trim().to_string()),
                    author: None,
                }),
                Some(("author", value)) => Ok(EngineMessage::Id {
                    name: None,
                    author: Some(value.trim().to_string()),
                }),
                _ => Err(UciError::ParseError(format!("Malformed id line: '{}'", line))),
            },
            "option" => Ok(EngineMessage::Option(OptionDecl::parse(rest)?)),
            "info" => EngineInfo::parse(line)
                .map(EngineMessage::Info)
                .ok_or_else(|| UciError::ParseError(line.to_string())),
            "bestmove" => {
                let mut parts = rest.split_whitespace();
                let mv = parts
                    .next()
                    .ok_or_else(|| UciError::ParseError("bestmove without a move".to_string()))?;
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                Ok(EngineMessage::BestMove {
                    mv: mv.to_string(),
                    ponder,
                })
            }
            _ => Ok(EngineMessage::Unknown(line.to_string())),
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::Option(decl) => decl.to_uci(),
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => match ponder {
                Some(p) => format!("bestmove {} ponder {}", mv, p),
                None => format!("bestmove {}", mv),
            },
            EngineMessage::Unknown(text) => text.clone(),
        }
    }
}

/// Engine side of a UCI connection, for writing engines and test doubles.
pub struct UciEngine<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> UciEngine<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read and parse the next command from GUI.
    ///
    /// Returns [`UciError::Eof`] once the GUI closes its end.
    pub fn read_command(&mut self) -> Result<GuiCommand, UciError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(UciError::Eof);
        }
        GuiCommand::parse(&line)
    }

    /// Send a message to the GUI.
    pub fn send(&mut self, msg: &EngineMessage) -> Result<(), UciError> {
        writeln!(self.writer, "{}", msg.to_uci())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Send engine identification.
    pub fn send_id(&mut self, name: &str, author: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::Id {
            name: Some(name.to_string()),
            author: Some(author.to_string()),
        })
    }

    pub fn send_option(&mut self, decl: OptionDecl) -> Result<(), UciError> {
        self.send(&EngineMessage::Option(decl))
    }

    pub fn send_uciok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::UciOk)
    }

    pub fn send_readyok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::ReadyOk)
    }

    pub fn send_bestmove(&mut self, mv: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::BestMove {
            mv: mv.to_string(),
            ponder: None,
        })
    }

    pub fn send_info(&mut self, info: EngineInfo) -> Result<(), UciError> {
        self.send(&EngineMessage::Info(info))
    }
}

/// Create a UCI engine using stdin/stdout.
pub fn stdio_engine() -> UciEngine<std::io::StdinLock<'static>, std::io::Stdout> {
    UciEngine::new(std::io::stdin().lock(), std::io::stdout())
}
