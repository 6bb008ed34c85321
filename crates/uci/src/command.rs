//! UCI command parsing and formatting.

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// Change an engine option. Buttons carry no value.
    SetOption { name: String, value: Option<String> },
    /// The next position belongs to a different game.
    UciNewGame,
    /// Set up position.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// White time remaining in milliseconds.
    pub wtime: Option<u64>,
    /// Black time remaining in milliseconds.
    pub btime: Option<u64>,
    /// White increment per move in milliseconds.
    pub winc: Option<u64>,
    /// Black increment per move in milliseconds.
    pub binc: Option<u64>,
    /// Moves to go until next time control.
    pub movestogo: Option<u32>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    pub fn movetime(ms: u64) -> Self {
        Self {
            movetime: Some(ms),
            ..Self::default()
        }
    }

    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    /// Format as a `go` line.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["go".to_string()];
        let numeric = [
            ("wtime", self.wtime),
            ("btime", self.btime),
            ("winc", self.winc),
            ("binc", self.binc),
            ("movestogo", self.movestogo.map(u64::from)),
            ("depth", self.depth.map(u64::from)),
            ("movetime", self.movetime),
        ];
        for (key, value) in numeric {
            if let Some(v) = value {
                parts.push(format!("{} {}", key, v));
            }
        }
        if self.infinite {
            parts.push("infinite".to_string());
        }
        parts.join(" ")
    }
}

impl GuiCommand {
    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        let cmd = parts.next().unwrap_or("");

        match cmd {
            "uci" => Ok(GuiCommand::Uci),
            "isready" => Ok(GuiCommand::IsReady),
            "ucinewgame" => Ok(GuiCommand::UciNewGame),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "setoption" => Self::parse_setoption(parts),
            "position" => Self::parse_position(parts),
            "go" => Self::parse_go(parts),
            "" => Ok(GuiCommand::Unknown(String::new())),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    /// Format command for sending to an engine.
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::SetOption { name, value } => match value {
                Some(v) => format!("setoption name {} value {}", name, v),
                None => format!("setoption name {}", name),
            },
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(f) => format!("position fen {}", f),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            GuiCommand::Go(opts) => opts.to_uci(),
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
            GuiCommand::Unknown(text) => text.clone(),
        }
    }

    fn parse_setoption<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        if parts.next() != Some("name") {
            return Err(UciError::ParseError(
                "setoption: expected 'name'".to_string(),
            ));
        }

        // Names and values may both contain spaces.
        let mut name = Vec::new();
        let mut value = None::<Vec<&str>>;
        for part in parts {
            match value.as_mut() {
                Some(v) => v.push(part),
                None if part == "value" => value = Some(Vec::new()),
                None => name.push(part),
            }
        }

        if name.is_empty() {
            return Err(UciError::ParseError(
                "setoption: missing option name".to_string(),
            ));
        }
        Ok(GuiCommand::SetOption {
            name: name.join(" "),
            value: value.map(|v| v.join(" ")),
        })
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut fen = None;

        match parts.next() {
            Some("startpos") => {
                if let Some(next) = parts.next() {
                    if next != "moves" {
                        return Err(UciError::ParseError(format!(
                            "Expected 'moves' after 'startpos', got '{}'",
                            next
                        )));
                    }
                }
            }
            Some("fen") => {
                // FEN fields run until "moves" or end
                let mut fen_parts = Vec::new();
                for part in parts.by_ref() {
                    if part == "moves" {
                        break;
                    }
                    fen_parts.push(part);
                }
                if fen_parts.is_empty() {
                    return Err(UciError::ParseError("position fen: missing FEN".to_string()));
                }
                fen = Some(fen_parts.join(" "));
            }
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::ParseError(
                    "Expected 'startpos' or 'fen'".to_string(),
                ));
            }
        }

        let moves = parts.map(str::to_string).collect();
        Ok(GuiCommand::Position { fen, moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = parts.collect();
        let mut i = 0;

        while i < parts.len() {
            let value = parts.get(i + 1).copied();
            match parts[i] {
                "movetime" => opts.movetime = value.and_then(|v| v.parse().ok()),
                "depth" => opts.depth = value.and_then(|v| v.parse().ok()),
                "wtime" => opts.wtime = value.and_then(|v| v.parse().ok()),
                "btime" => opts.btime = value.and_then(|v| v.parse().ok()),
                "winc" => opts.winc = value.and_then(|v| v.parse().ok()),
                "binc" => opts.binc = value.and_then(|v| v.parse().ok()),
                "movestogo" => opts.movestogo = value.and_then(|v| v.parse().ok()),
                "infinite" => {
                    opts.infinite = true;
                    i += 1;
                    continue;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Ok(GuiCommand::Go(opts))
    }
}
