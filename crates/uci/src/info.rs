//! UCI `info` lines.

use serde::{Deserialize, Serialize};

/// Score in centipawns or mate distance, from the side to move's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = engine mating, negative = engine mated).
    Mate(i32),
}

impl Score {
    /// Collapses the score onto a centipawn scale where a mate in `n` is
    /// worth `mate_value - n`.
    pub fn to_centipawns(self, mate_value: i32) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) if n > 0 => mate_value - n,
            Score::Mate(n) if n < 0 => -mate_value - n,
            // "mate 0": the side to move is already mated
            Score::Mate(_) => -mate_value,
        }
    }

    /// The same score seen from the other side.
    pub fn negate(self) -> Self {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }
}

/// Whether a score is exact or only a search bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Bound {
    #[default]
    Exact,
    Lower,
    Upper,
}

/// Search information from engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub bound: Bound,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time: Option<u64>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    pub currmove: Option<String>,
    pub currmovenumber: Option<u32>,
    /// Hash table usage (per mille).
    pub hashfull: Option<u32>,
    /// Free text; consumes the rest of the line.
    pub string: Option<String>,
}

const KEYWORDS: [&str; 13] = [
    "depth",
    "seldepth",
    "multipv",
    "score",
    "nodes",
    "nps",
    "time",
    "pv",
    "currmove",
    "currmovenumber",
    "hashfull",
    "tbhits",
    "string",
];

impl EngineInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as UCI info string.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["info".to_string()];
        let mut field = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                parts.push(format!("{} {}", key, v));
            }
        };

        field("depth", self.depth.map(|v| v.to_string()));
        field("seldepth", self.seldepth.map(|v| v.to_string()));
        field("multipv", self.multipv.map(|v| v.to_string()));
        field(
            "score",
            self.score.map(|s| {
                let base = match s {
                    Score::Cp(cp) => format!("cp {}", cp),
                    Score::Mate(m) => format!("mate {}", m),
                };
                match self.bound {
                    Bound::Exact => base,
                    Bound::Lower => format!("{} lowerbound", base),
                    Bound::Upper => format!("{} upperbound", base),
                }
            }),
        );
        field("nodes", self.nodes.map(|v| v.to_string()));
        field("nps", self.nps.map(|v| v.to_string()));
        field("time", self.time.map(|v| v.to_string()));
        field("hashfull", self.hashfull.map(|v| v.to_string()));
        field("currmove", self.currmove.clone());
        field("currmovenumber", self.currmovenumber.map(|v| v.to_string()));
        field("pv", (!self.pv.is_empty()).then(|| self.pv.join(" ")));
        field("string", self.string.clone());

        parts.join(" ")
    }

    /// Parse a UCI info line. Returns `None` if the line is not an `info` line.
    ///
    /// Unknown keywords are skipped.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().peekable();
        if tokens.next() != Some("info") {
            return None;
        }

        let mut info = EngineInfo::new();
        while let Some(key) = tokens.next() {
            match key {
                "depth" => info.depth = tokens.next().and_then(|v| v.parse().ok()),
                "seldepth" => info.seldepth = tokens.next().and_then(|v| v.parse().ok()),
                "multipv" => info.multipv = tokens.next().and_then(|v| v.parse().ok()),
                "nodes" => info.nodes = tokens.next().and_then(|v| v.parse().ok()),
                "nps" => info.nps = tokens.next().and_then(|v| v.parse().ok()),
                "time" => info.time = tokens.next().and_then(|v| v.parse().ok()),
                "hashfull" => info.hashfull = tokens.next().and_then(|v| v.parse().ok()),
                "currmove" => info.currmove = tokens.next().map(str::to_string),
                "currmovenumber" => {
                    info.currmovenumber = tokens.next().and_then(|v| v.parse().ok())
                }
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|v| v.parse().ok());
                    info.score = match (kind, value) {
                        (Some("cp"), Some(v)) => Some(Score::Cp(v)),
                        (Some("mate"), Some(v)) => Some(Score::Mate(v)),
                        _ => None,
                    };
                    info.bound = match tokens.peek() {
                        Some(&"lowerbound") => Bound::Lower,
                        Some(&"upperbound") => Bound::Upper,
                        _ => Bound::Exact,
                    };
                    if info.bound != Bound::Exact {
                        tokens.next();
                    }
                }
                "pv" => {
                    while let Some(mv) = tokens.next_if(|t| !KEYWORDS.contains(t)) {
                        info.pv.push(mv.to_string());
                    }
                }
                "string" => {
                    info.string = Some(tokens.by_ref().collect::<Vec<_>>().join(" "));
                }
                _ => {}
            }
        }

        Some(info)
    }
}

/// Builder for constructing EngineInfo.
#[derive(Default)]
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn nodes(mut self, n: u64) -> Self {
        self.info.nodes = Some(n);
        self
    }

    pub fn time(mut self, ms: u64) -> Self {
        self.info.time = Some(ms);
        self
    }

    pub fn pv(mut self, moves: Vec<String>) -> Self {
        self.info.pv = moves;
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.info.string = Some(s.to_string());
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}
