//! UCI client for driving a chess engine subprocess.
//!
//! A [`UciClient`] owns exactly one engine process. Commands are written to
//! the engine's stdin; a reader thread forwards every stdout line over a
//! channel so that each wait is bounded by a deadline. A search that runs
//! past its deadline is stopped, and an engine that ignores `stop` is killed.
//!
//! # Example
//!
//! ```no_run
//! use arbiter::uci_client::{EngineLimits, SearchBudget, UciClient};
//! use chess_rules::Game;
//!
//! let mut client = UciClient::start("/usr/bin/stockfish", &[], &EngineLimits::default())?;
//! let game = Game::new();
//! client.set_game(&game)?;
//! let best = client.request_best_move(game.board(), &SearchBudget::Depth(12))?;
//! println!("Best move: {}", best.mv.to_uci());
//! # Ok::<(), arbiter::uci_client::EngineError>(())
//! ```

use chess_core::{Color, Move};
use chess_rules::{resolve_uci, Board, Game};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};
use uci::{EngineInfo, EngineMessage, GoOptions, GuiCommand, OptionDecl, OptionKind, Score};

/// Longest single wait on the line channel, so cancellation is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors that can occur when communicating with a UCI engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not be launched or failed its handshake.
    #[error("engine failed to start: {0}")]
    Startup(String),
    /// The engine ignored `stop` after its search deadline.
    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),
    /// The engine's pipes are closed; the client must be restarted.
    #[error("engine disconnected")]
    Disconnected,
    /// The engine sent something that breaks the protocol, such as an illegal move.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A requested option was not advertised, or its value is out of range.
    #[error("unsupported engine option: {0}")]
    UnsupportedOption(String),
    /// The search was cancelled through a [`CancelHandle`].
    #[error("search cancelled")]
    Cancelled,
}

/// Time bounds applied to every engine interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Bound on each handshake step (`uciok`, `readyok`).
    pub handshake_timeout: Duration,
    /// How long the engine gets to answer `stop` or `quit`.
    pub grace: Duration,
    /// Deadline for searches that carry no time of their own (`go depth`).
    pub search_timeout: Duration,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            grace: Duration::from_secs(1),
            search_timeout: Duration::from_secs(60),
        }
    }
}

/// The position an engine is told about: a start and the moves since.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionSpec {
    /// `None` for the standard start position.
    pub fen: Option<String>,
    /// Moves in coordinate notation.
    pub moves: Vec<String>,
}

impl PositionSpec {
    pub fn startpos() -> Self {
        Self::default()
    }

    pub fn from_board(board: &Board) -> Self {
        Self {
            fen: Some(board.to_fen()),
            moves: Vec::new(),
        }
    }

    /// The game's start position plus every move played, so the engine
    /// sees the full repetition history.
    pub fn from_game(game: &Game) -> Self {
        let start = game.start_board();
        let fen = (start != &Board::startpos()).then(|| start.to_fen());
        Self {
            fen,
            moves: game.uci_moves(),
        }
    }

    fn to_command(&self) -> GuiCommand {
        GuiCommand::Position {
            fen: self.fen.clone(),
            moves: self.moves.clone(),
        }
    }
}

/// How long an engine may think about one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBudget {
    /// Remaining clock times and increments for both sides.
    Clock {
        wtime: Duration,
        btime: Duration,
        winc: Duration,
        binc: Duration,
    },
    /// Fixed time per move.
    MoveTime(Duration),
    /// Fixed depth in plies.
    Depth(u32),
}

impl SearchBudget {
    pub fn go_options(&self) -> GoOptions {
        match *self {
            SearchBudget::Clock {
                wtime,
                btime,
                winc,
                binc,
            } => GoOptions {
                wtime: Some(millis(wtime)),
                btime: Some(millis(btime)),
                winc: Some(millis(winc)),
                binc: Some(millis(binc)),
                ..GoOptions::default()
            },
            SearchBudget::MoveTime(t) => GoOptions::movetime(millis(t)),
            SearchBudget::Depth(d) => GoOptions::depth(d),
        }
    }

    /// Time after which the watchdog sends `stop` to a search by `mover`.
    pub fn deadline(&self, mover: Color, limits: &EngineLimits) -> Duration {
        match *self {
            SearchBudget::Clock { wtime, btime, .. } => match mover {
                Color::White => wtime,
                Color::Black => btime,
            },
            SearchBudget::MoveTime(t) => t,
            SearchBudget::Depth(_) => limits.search_timeout,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// The engine's answer to a search.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMove {
    /// The move, already matched against the legal moves of the position.
    pub mv: Move,
    pub ponder: Option<String>,
    /// The last `info` line the engine sent during the search.
    pub info: Option<EngineInfo>,
    pub elapsed: Duration,
}

/// Result of a fixed-depth analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// `None` when the position has no legal moves.
    pub best_move: Option<Move>,
    /// Score from the side to move's point of view.
    pub score: Option<Score>,
    pub depth: Option<u32>,
    pub pv: Vec<String>,
}

/// Cancels the search pending on a [`UciClient`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag, returning whether it was set.
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Lifecycle of the engine connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Ready,
    /// The pipes broke or the engine was killed; only `restart` helps.
    Failed,
    /// Shut down through `stop`.
    Stopped,
}

struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    reader: Option<JoinHandle<()>>,
}

enum Recv {
    Line(String),
    TimedOut,
    Closed,
    Cancelled,
}

/// A connection to one UCI engine process.
pub struct UciClient {
    path: PathBuf,
    requested: Vec<(String, String)>,
    limits: EngineLimits,
    name: Option<String>,
    author: Option<String>,
    declared: Vec<OptionDecl>,
    position: Option<PositionSpec>,
    process: Option<EngineProcess>,
    state: ClientState,
    cancel: CancelHandle,
}

impl UciClient {
    /// Launches the engine at `path` and completes the UCI handshake.
    ///
    /// Each `(name, value)` in `options` must name an option the engine
    /// advertises (case-insensitively) and is sent with `setoption`. On any
    /// failure the process is killed and reaped before the error returns.
    pub fn start(
        path: impl AsRef<Path>,
        options: &[(String, String)],
        limits: &EngineLimits,
    ) -> Result<Self, EngineError> {
        let mut client = UciClient {
            path: path.as_ref().to_path_buf(),
            requested: options.to_vec(),
            limits: *limits,
            name: None,
            author: None,
            declared: Vec::new(),
            position: None,
            process: None,
            state: ClientState::Stopped,
            cancel: CancelHandle::default(),
        };
        client.launch()?;
        Ok(client)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Options the engine advertised during the handshake.
    pub fn declared_options(&self) -> &[OptionDecl] {
        &self.declared
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// OS process id of the running engine, if any.
    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.child.id())
    }

    /// A handle that cancels the next or pending search of this client.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Tells the engine a new game begins and waits until it is ready.
    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::UciNewGame)?;
        self.sync(self.limits.handshake_timeout)
    }

    pub fn set_position(&mut self, position: &PositionSpec) -> Result<(), EngineError> {
        self.send(&position.to_command())?;
        self.position = Some(position.clone());
        Ok(())
    }

    /// The position last sent to the running engine process.
    pub fn position(&self) -> Option<&PositionSpec> {
        self.position.as_ref()
    }

    pub fn set_game(&mut self, game: &Game) -> Result<(), EngineError> {
        self.set_position(&PositionSpec::from_game(game))
    }

    /// Runs a search on the position last sent and returns the engine's move.
    ///
    /// `board` must be that same position; the answer is matched against its
    /// legal moves and anything else is a [`EngineError::Protocol`] error.
    pub fn request_best_move(
        &mut self,
        board: &Board,
        budget: &SearchBudget,
    ) -> Result<BestMove, EngineError> {
        if self.cancel.take() {
            return Err(EngineError::Cancelled);
        }
        let deadline_after = budget.deadline(board.side_to_move(), &self.limits);
        self.send(&GuiCommand::Go(budget.go_options()))?;

        let started = Instant::now();
        let deadline = started + deadline_after;
        let mut last_info = None;
        loop {
            match self.next_line(deadline, true) {
                Recv::Line(line) => match EngineMessage::parse(&line) {
                    Ok(EngineMessage::BestMove { mv, ponder }) => {
                        let mv = self.accept_move(board, &mv)?;
                        return Ok(BestMove {
                            mv,
                            ponder,
                            info: last_info,
                            elapsed: started.elapsed(),
                        });
                    }
                    Ok(EngineMessage::Info(info)) => last_info = Some(info),
                    Ok(_) => {}
                    Err(e) => debug!("ignoring unparsable engine line: {}", e),
                },
                Recv::TimedOut => {
                    warn!(
                        engine = %self.path.display(),
                        "search deadline of {:?} passed, sending stop",
                        deadline_after
                    );
                    return match self.stop_search()? {
                        Some(mv) => {
                            let mv = self.accept_move(board, &mv)?;
                            Ok(BestMove {
                                mv,
                                ponder: None,
                                info: last_info,
                                elapsed: started.elapsed(),
                            })
                        }
                        None => Err(EngineError::Timeout(started.elapsed())),
                    };
                }
                Recv::Cancelled => {
                    debug!("search cancelled, sending stop");
                    self.stop_search()?;
                    return Err(EngineError::Cancelled);
                }
                Recv::Closed => return Err(self.disconnected()),
            }
        }
    }

    /// Searches `board` to `depth` and reports the deepest score and line.
    pub fn analyse(&mut self, board: &Board, depth: u32) -> Result<Analysis, EngineError> {
        self.set_position(&PositionSpec::from_board(board))?;
        self.send(&GuiCommand::Go(GoOptions::depth(depth)))?;

        let deadline = Instant::now() + self.limits.search_timeout;
        let mut analysis = Analysis {
            best_move: None,
            score: None,
            depth: None,
            pv: Vec::new(),
        };
        loop {
            match self.next_line(deadline, true) {
                Recv::Line(line) => match EngineMessage::parse(&line) {
                    Ok(EngineMessage::Info(info)) => {
                        if info.multipv.unwrap_or(1) == 1 && info.score.is_some() {
                            analysis.score = info.score;
                            analysis.depth = info.depth.or(analysis.depth);
                            if !info.pv.is_empty() {
                                analysis.pv = info.pv;
                            }
                        }
                    }
                    Ok(EngineMessage::BestMove { mv, .. }) => {
                        if !is_null_move(&mv) {
                            analysis.best_move = Some(self.accept_move(board, &mv)?);
                        }
                        return Ok(analysis);
                    }
                    Ok(_) => {}
                    Err(e) => debug!("ignoring unparsable engine line: {}", e),
                },
                Recv::TimedOut => {
                    warn!(engine = %self.path.display(), "analysis deadline passed, sending stop");
                    return match self.stop_search()? {
                        Some(mv) => {
                            if !is_null_move(&mv) {
                                analysis.best_move = Some(self.accept_move(board, &mv)?);
                            }
                            Ok(analysis)
                        }
                        None => Err(EngineError::Timeout(self.limits.search_timeout)),
                    };
                }
                Recv::Cancelled => {
                    self.stop_search()?;
                    return Err(EngineError::Cancelled);
                }
                Recv::Closed => return Err(self.disconnected()),
            }
        }
    }

    /// Shuts the engine down: `quit`, close pipes, wait, kill if needed, reap.
    ///
    /// Calling it again is a no-op.
    pub fn stop(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        if let Some(mut stdin) = process.stdin.take() {
            trace!(target: "uci", ">> quit");
            let _ = writeln!(stdin, "quit").and_then(|_| stdin.flush());
        }

        let deadline = Instant::now() + self.limits.grace;
        loop {
            match process.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(engine = %self.path.display(), "engine exited with {}", status);
                    break;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                _ => {
                    warn!(engine = %self.path.display(), "engine ignored quit, killing it");
                    let _ = process.child.kill();
                    break;
                }
            }
        }
        reap(&mut process);
        if self.state != ClientState::Failed {
            self.state = ClientState::Stopped;
        }
    }

    /// Relaunches the same binary with the same options.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        warn!(engine = %self.path.display(), "restarting engine");
        self.stop();
        self.launch()
    }

    fn launch(&mut self) -> Result<(), EngineError> {
        check_executable(&self.path)?;
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Startup(format!("{}: {}", self.path.display(), e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Startup("engine pipes unavailable".to_string()));
        };

        let (tx, lines) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("uci-reader".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| EngineError::Startup(e.to_string()));
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        self.process = Some(EngineProcess {
            child,
            stdin: Some(stdin),
            lines,
            reader: Some(reader),
        });
        self.state = ClientState::Ready;
        self.name = None;
        self.author = None;
        self.declared.clear();
        self.position = None;

        if let Err(e) = self.handshake() {
            self.kill();
            return Err(e);
        }
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        let timeout = self.limits.handshake_timeout;
        self.send(&GuiCommand::Uci).map_err(startup)?;

        let deadline = Instant::now() + timeout;
        loop {
            match self.next_line(deadline, false) {
                Recv::Line(line) => match EngineMessage::parse(&line) {
                    Ok(EngineMessage::UciOk) => break,
                    Ok(EngineMessage::Id { name, author }) => {
                        self.name = name.or(self.name.take());
                        self.author = author.or(self.author.take());
                    }
                    Ok(EngineMessage::Option(decl)) => self.declared.push(decl),
                    Ok(_) => {}
                    Err(e) => debug!("ignoring unparsable handshake line: {}", e),
                },
                Recv::TimedOut => {
                    return Err(EngineError::Startup(format!("no uciok within {:?}", timeout)))
                }
                Recv::Closed | Recv::Cancelled => {
                    return Err(EngineError::Startup(
                        "engine exited during handshake".to_string(),
                    ))
                }
            }
        }
        debug!(
            engine = %self.path.display(),
            name = self.name.as_deref().unwrap_or("?"),
            "uciok with {} options",
            self.declared.len()
        );

        for (name, value) in self.requested.clone() {
            let decl = self
                .declared
                .iter()
                .find(|d| d.matches_name(&name))
                .ok_or_else(|| EngineError::UnsupportedOption(name.clone()))?;
            let value = (decl.kind != OptionKind::Button).then_some(value);
            if !decl.accepts(value.as_deref()) {
                return Err(EngineError::UnsupportedOption(format!(
                    "{} = {}",
                    decl.name,
                    value.unwrap_or_default()
                )));
            }
            let value = match decl.kind {
                OptionKind::Check => value.map(|v| v.to_ascii_lowercase()),
                _ => value,
            };
            debug!("setting option {} = {:?}", decl.name, value);
            let command = GuiCommand::SetOption {
                name: decl.name.clone(),
                value,
            };
            self.send(&command).map_err(startup)?;
        }

        self.sync(timeout).map_err(startup)
    }

    /// `isready` / `readyok` round trip.
    fn sync(&mut self, timeout: Duration) -> Result<(), EngineError> {
        self.send(&GuiCommand::IsReady)?;
        let deadline = Instant::now() + timeout;
        loop {
            match self.next_line(deadline, false) {
                Recv::Line(line) if line.trim() == "readyok" => return Ok(()),
                Recv::Line(_) => {}
                Recv::TimedOut => return Err(EngineError::Timeout(timeout)),
                Recv::Closed | Recv::Cancelled => return Err(self.disconnected()),
            }
        }
    }

    /// Sends `stop` and waits out the grace period for `bestmove`.
    ///
    /// Returns `None` after killing an engine that never answered.
    fn stop_search(&mut self) -> Result<Option<String>, EngineError> {
        self.send(&GuiCommand::Stop)?;
        let deadline = Instant::now() + self.limits.grace;
        loop {
            match self.next_line(deadline, false) {
                Recv::Line(line) => {
                    if let Ok(EngineMessage::BestMove { mv, .. }) = EngineMessage::parse(&line) {
                        return Ok(Some(mv));
                    }
                }
                Recv::TimedOut => {
                    warn!(engine = %self.path.display(), "no bestmove after stop, killing engine");
                    self.kill();
                    return Ok(None);
                }
                Recv::Closed | Recv::Cancelled => return Err(self.disconnected()),
            }
        }
    }

    fn accept_move(&self, board: &Board, text: &str) -> Result<Move, EngineError> {
        if is_null_move(text) {
            return Err(EngineError::Protocol(format!(
                "engine returned no move ({}) in {}",
                text,
                board.to_fen()
            )));
        }
        resolve_uci(board, text).ok_or_else(|| {
            EngineError::Protocol(format!("illegal bestmove {} in {}", text, board.to_fen()))
        })
    }

    fn send(&mut self, command: &GuiCommand) -> Result<(), EngineError> {
        if self.state != ClientState::Ready {
            return Err(EngineError::Disconnected);
        }
        let line = command.to_uci();
        trace!(target: "uci", ">> {}", line);
        let written = match self.process.as_mut().and_then(|p| p.stdin.as_mut()) {
            Some(stdin) => writeln!(stdin, "{}", line).and_then(|_| stdin.flush()),
            None => return Err(EngineError::Disconnected),
        };
        written.map_err(|e| {
            debug!("write to engine failed: {}", e);
            self.disconnected()
        })
    }

    fn next_line(&mut self, deadline: Instant, watch_cancel: bool) -> Recv {
        let Some(process) = self.process.as_ref() else {
            return Recv::Closed;
        };
        loop {
            if watch_cancel && self.cancel.take() {
                return Recv::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return Recv::TimedOut;
            }
            match process.lines.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
                Ok(line) => {
                    trace!(target: "uci", "<< {}", line);
                    return Recv::Line(line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Recv::Closed,
            }
        }
    }

    /// Marks the connection failed and reaps the process.
    fn disconnected(&mut self) -> EngineError {
        warn!(engine = %self.path.display(), "engine disconnected");
        self.kill();
        EngineError::Disconnected
    }

    fn kill(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.stdin.take();
            let _ = process.child.kill();
            reap(&mut process);
        }
        self.state = ClientState::Failed;
    }
}

impl Drop for UciClient {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reap(process: &mut EngineProcess) {
    process.stdin.take();
    let _ = process.child.wait();
    // A forked descendant may still hold stdout open; the reader then stays
    // detached until EOF or until it finds the channel closed.
    if let Some(reader) = process.reader.take() {
        if reader.is_finished() {
            let _ = reader.join();
        } else {
            trace!(target: "uci", "reader still attached to stdout, detaching");
        }
    }
}

fn startup(e: EngineError) -> EngineError {
    match e {
        EngineError::Startup(_) | EngineError::UnsupportedOption(_) => e,
        other => EngineError::Startup(other.to_string()),
    }
}

fn is_null_move(text: &str) -> bool {
    matches!(text, "0000" | "(none)")
}

fn check_executable(path: &Path) -> Result<(), EngineError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| EngineError::Startup(format!("{}: {}", path.display(), e)))?;
    if !metadata.is_file() {
        return Err(EngineError::Startup(format!(
            "{} is not a file",
            path.display()
        )));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(EngineError::Startup(format!(
                "{} is not executable",
                path.display()
            )));
        }
    }
    Ok(())
}
