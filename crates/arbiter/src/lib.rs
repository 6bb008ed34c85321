//! Chess game orchestration between humans and UCI engines.
//!
//! - [`uci_client`] drives one engine process with bounded waits.
//! - [`session`] alternates two seats over a [`chess_rules::Game`].
//! - [`clock`], [`config`], [`pgn`] and [`analysis`] support matches run
//!   from the `arbiter` binary.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod pgn;
pub mod session;
pub mod uci_client;

pub use analysis::{AnalysisConfig, GameAnalysis, GameAnalyzer, MoveQuality, PlayerStats};
pub use clock::{Clock, TimeControl};
pub use config::{ArbiterConfig, ConfigError, EngineConfig};
pub use pgn::{read_games, read_pgn_file, to_pgn, write_pgn, PgnError, PgnGame, PgnHeaders};
pub use session::{
    EngineSeat, HumanAction, HumanPlayer, SearchLimit, Seat, Session, SessionError,
    SessionOutcome,
};
pub use uci_client::{
    Analysis, BestMove, CancelHandle, ClientState, EngineError, EngineLimits, PositionSpec,
    SearchBudget, UciClient,
};
