//! Configuration file loading for the arbiter.
//!
//! Engines, the optional time control and engine timeouts are read from
//! `arbiter.toml` in the current directory. A missing file yields defaults.
//!
//! ```toml
//! [engines.stockfish]
//! path = "/usr/bin/stockfish"
//! options = { Hash = 64, Threads = 2 }
//! search = { depth = 12 }
//!
//! [time_control]
//! initial_ms = 60000
//! increment_ms = 1000
//!
//! [limits]
//! handshake_timeout_ms = 5000
//! restart_limit = 2
//! ```

use crate::clock::TimeControl;
use crate::session::SearchLimit;
use crate::uci_client::EngineLimits;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Engine not found: {0}")]
    EngineNotFound(String),
}

/// An option value as written in TOML; engines receive it as text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(n) => write!(f, "{}", n),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

/// Per-move search limit used when no clock is running.
///
/// `depth` wins when both are given; neither means 500 ms per move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchConfig {
    pub depth: Option<u32>,
    pub movetime_ms: Option<u64>,
}

impl SearchConfig {
    pub fn limit(&self) -> SearchLimit {
        match (self.depth, self.movetime_ms) {
            (Some(depth), _) => SearchLimit::Depth(depth),
            (None, Some(ms)) => SearchLimit::MoveTime(Duration::from_millis(ms)),
            (None, None) => SearchLimit::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
    #[serde(default)]
    pub search: SearchConfig,
}

impl EngineConfig {
    /// An engine known only by its path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: BTreeMap::new(),
            search: SearchConfig::default(),
        }
    }

    /// Options as `(name, value)` text pairs for the handshake.
    pub fn option_pairs(&self) -> Vec<(String, String)> {
        self.options
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeControlConfig {
    pub initial_ms: u64,
    #[serde(default)]
    pub increment_ms: u64,
}

impl TimeControlConfig {
    pub fn time_control(&self) -> TimeControl {
        TimeControl::new(
            Duration::from_millis(self.initial_ms),
            Duration::from_millis(self.increment_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,
    #[serde(default = "default_restart_limit")]
    pub restart_limit: u32,
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_grace_ms() -> u64 {
    1_000
}

fn default_search_timeout_ms() -> u64 {
    60_000
}

fn default_restart_limit() -> u32 {
    1
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: default_handshake_timeout_ms(),
            grace_ms: default_grace_ms(),
            search_timeout_ms: default_search_timeout_ms(),
            restart_limit: default_restart_limit(),
        }
    }
}

impl LimitsConfig {
    pub fn engine_limits(&self) -> EngineLimits {
        EngineLimits {
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            grace: Duration::from_millis(self.grace_ms),
            search_timeout: Duration::from_millis(self.search_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ArbiterConfig {
    #[serde(default)]
    pub engines: BTreeMap<String, EngineConfig>,
    #[serde(default)]
    pub time_control: Option<TimeControlConfig>,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl ArbiterConfig {
    /// Loads `arbiter.toml` from the current directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Loads a config file; a missing file gives the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn config_path() -> PathBuf {
        PathBuf::from("arbiter.toml")
    }

    pub fn engine(&self, name: &str) -> Result<&EngineConfig, ConfigError> {
        self.engines
            .get(name)
            .ok_or_else(|| ConfigError::EngineNotFound(name.to_string()))
    }

    /// Looks `name` up among the configured engines, falling back to treating
    /// it as a path when it is not configured but exists on disk.
    pub fn resolve_engine(&self, name: &str) -> Result<EngineConfig, ConfigError> {
        match self.engine(name) {
            Ok(engine) => Ok(engine.clone()),
            Err(_) if Path::new(name).exists() => Ok(EngineConfig::from_path(name)),
            Err(e) => Err(e),
        }
    }
}
