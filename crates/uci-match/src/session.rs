//! UCI session: one engine process and its protocol state.
//!
//! A session owns its [`LineChannel`] for its whole lifetime. Every command
//! that changes engine state is followed by an `isready`/`readyok` round-trip
//! before the next one goes out, since UCI offers no other acknowledgement.
//!
//! # Example
//!
//! ```no_run
//! use uci::SearchLimit;
//! use uci_match::session::{SessionConfig, UciSession};
//!
//! let config = SessionConfig {
//!     search: Some(SearchLimit::Depth(12)),
//!     ..Default::default()
//! };
//! let mut session = UciSession::start("stockfish", config)?;
//! session.new_game()?;
//! session.set_position(&[])?;
//! let result = session.best_move()?;
//! println!("Best move: {} ({:?})", result.best_move, result.score);
//! # Ok::<(), uci_match::error::SessionError>(())
//! ```

use crate::channel::{Deadline, LineChannel, ProcessChannel};
use crate::error::SessionError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uci::{
    extract_score, predicts_no_reply, BestMove, ClientCommand, EngineOptions, InfoRecord,
    MoveToken, OptionValue, PositionSpec, SearchLimit, StaticEval, BESTMOVE, READYOK, UCIOK,
};

/// Substring an engine prints when `setoption` names an option it lacks.
const OPTION_REJECTED: &str = "No such";

/// Inclusive range `Contempt` and `Contempt Factor` are drawn from when
/// randomized contempt is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContemptRange {
    /// Lowest value that may be drawn.
    pub min: i64,
    /// Highest value that may be drawn; must not be below `min`.
    pub max: i64,
}

/// How a session is set up before play.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Limit used by [`UciSession::go`]. `None` makes every search fail with
    /// [`SessionError::NoSearchLimit`].
    pub search: Option<SearchLimit>,
    /// Leave the engine's `Ponder` option alone instead of forcing it off.
    pub ponder: bool,
    /// Overrides merged over [`EngineOptions::base`].
    pub options: EngineOptions,
    /// Draw `Contempt` and `Contempt Factor` at random before the merge.
    pub random_contempt: Option<ContemptRange>,
    /// Upper bound for any single exchange with the engine.
    pub read_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search: Some(SearchLimit::Depth(2)),
            ponder: false,
            options: EngineOptions::new(),
            random_contempt: None,
            read_timeout: None,
        }
    }
}

/// An option the engine answered with "No such option".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOption {
    pub name: String,
    /// Value the session tried to apply.
    pub value: OptionValue,
    /// The engine's reply line.
    pub response: String,
}

/// Outcome of a single search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// Chosen move as sent by the engine.
    pub best_move: String,
    /// Expected reply, `(none)` when the engine has none.
    pub ponder: Option<String>,
    /// Last line before `bestmove` that carried a score, verbatim.
    pub info: String,
    /// Score of `info` on the mapped centipawn scale.
    pub score: Option<i32>,
}

impl SearchResult {
    /// True when the engine predicted no reply to its move.
    pub fn has_no_ponder(&self) -> bool {
        predicts_no_reply(self.ponder.as_deref())
    }
}

/// Outcome of a search along with every parsed progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchProgress {
    /// Chosen move as sent by the engine.
    pub best_move: String,
    /// Expected reply, if the engine named one.
    pub ponder: Option<String>,
    /// Parsed `info` lines in the order the engine printed them.
    pub infos: Vec<InfoRecord>,
}

/// A client session with one UCI engine.
///
/// # Lifecycle
///
/// 1. Start the engine with [`UciSession::start`] (handshake and options)
/// 2. Call [`UciSession::new_game`] once before play
/// 3. Set positions and search with [`UciSession::set_position`] and
///    [`UciSession::best_move`]
/// 4. Shut down with [`UciSession::quit`], or just drop the session
pub struct UciSession<C: LineChannel = ProcessChannel> {
    channel: C,
    /// The engine's name as reported during the handshake.
    name: String,
    search: Option<SearchLimit>,
    read_timeout: Option<Duration>,
    /// Options the engine accepted, by name.
    options: EngineOptions,
    rejected: Vec<RejectedOption>,
    /// Set once the engine exited or stopped answering.
    failed: bool,
}

impl UciSession<ProcessChannel> {
    /// Launches the engine at `path` and configures it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineLaunchFailed`] if the process cannot be
    /// spawned, or any error raised during the handshake. The process is
    /// released on every error path.
    pub fn start<P: AsRef<Path>>(path: P, config: SessionConfig) -> Result<Self, SessionError> {
        let channel = ProcessChannel::spawn(path)?;
        Self::start_with(channel, config, &mut rand::rng())
    }
}

impl<C: LineChannel> UciSession<C> {
    /// Runs the handshake over an already connected channel.
    ///
    /// Sends `uci` and waits for `uciok`, forces `Ponder` off unless
    /// pondering was requested, then applies the base option table with the
    /// caller's overrides on top. Rejected options are logged and collected
    /// in [`rejected_options`](Self::rejected_options).
    pub fn start_with<R: Rng + ?Sized>(
        channel: C,
        config: SessionConfig,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        let mut table = EngineOptions::base();
        if let Some(range) = config.random_contempt {
            if range.min > range.max {
                return Err(SessionError::InvalidContemptRange(range.min, range.max));
            }
            table.set("Contempt", rng.random_range(range.min..=range.max));
            table.set("Contempt Factor", rng.random_range(range.min..=range.max));
        }
        table.merge(&config.options);

        let mut session = Self {
            channel,
            name: String::new(),
            search: config.search,
            read_timeout: config.read_timeout,
            options: EngineOptions::new(),
            rejected: Vec::new(),
            failed: false,
        };

        session.handshake()?;

        if !config.ponder {
            session.set_option("Ponder", false)?;
        }

        for (name, value) in table.iter() {
            session.set_option(name, value.clone())?;
        }

        tracing::info!(
            engine = %session.name,
            applied = session.options.len(),
            rejected = session.rejected.len(),
            "engine configured"
        );

        Ok(session)
    }

    fn handshake(&mut self) -> Result<(), SessionError> {
        self.send(&ClientCommand::Uci)?;
        let deadline = self.deadline();

        let mut name = String::new();
        loop {
            let line = self.read_line(deadline.as_ref())?;
            if let Some(id) = line.strip_prefix("id name ") {
                name = id.trim().to_string();
            } else if line == UCIOK {
                break;
            }
        }

        self.name = if name.is_empty() {
            "Unknown Engine".to_string()
        } else {
            name
        };
        Ok(())
    }

    /// Returns the engine's name as reported via `id name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options the engine accepted, with the value last applied.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Options the engine did not recognise, in the order they were tried.
    pub fn rejected_options(&self) -> &[RejectedOption] {
        &self.rejected
    }

    fn deadline(&self) -> Option<Deadline> {
        self.read_timeout.map(Deadline::after)
    }

    fn send(&mut self, cmd: &ClientCommand) -> Result<(), SessionError> {
        self.put(&cmd.to_uci())
    }

    /// Sends a raw command line to the engine.
    ///
    /// Used for commands this crate has no typed form for, such as
    /// engine-specific debug commands.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once an earlier call failed fatally,
    /// or [`SessionError::ProcessTerminated`] if the engine has exited.
    pub fn put(&mut self, command: &str) -> Result<(), SessionError> {
        if self.failed {
            return Err(SessionError::Closed);
        }
        tracing::debug!(engine = %self.name, "> {}", command);
        let result = self.channel.write_line(command);
        self.check(result)
    }

    fn read_line(&mut self, deadline: Option<&Deadline>) -> Result<String, SessionError> {
        if self.failed {
            return Err(SessionError::Closed);
        }
        let result = self.channel.read_line(deadline);
        self.check(result)
    }

    /// Latches the session closed on errors that leave the engine unusable.
    fn check<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(e) = &result {
            if matches!(
                e,
                SessionError::ProcessTerminated
                    | SessionError::ProtocolTimeout(_)
                    | SessionError::Io(_)
            ) {
                tracing::warn!(engine = %self.name, error = %e, "session closed");
                self.failed = true;
            }
        }
        result
    }

    /// True once the engine exited or timed out; every later call fails
    /// with [`SessionError::Closed`].
    pub fn is_closed(&self) -> bool {
        self.failed
    }

    /// Sends `isready` and waits for `readyok`.
    ///
    /// Returns the line read just before `readyok`, or an empty string when
    /// `readyok` came first. That line is how engines report the outcome of
    /// the previous command.
    pub fn synchronize(&mut self) -> Result<String, SessionError> {
        self.send(&ClientCommand::IsReady)?;
        let deadline = self.deadline();

        let mut previous = String::new();
        loop {
            let line = self.read_line(deadline.as_ref())?;
            if line == READYOK {
                return Ok(previous);
            }
            previous = line;
        }
    }

    /// Sets one engine option.
    ///
    /// Engine builds differ in the options they expose, so a rejection is
    /// not an error: it is logged, recorded in
    /// [`rejected_options`](Self::rejected_options) and the session keeps
    /// whatever value it had before.
    ///
    /// # Arguments
    ///
    /// * `name` - Option name exactly as the engine spells it, e.g. `Hash`.
    /// * `value` - Anything convertible to an [`OptionValue`].
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the engine accepted the option, `Ok(false)` if it
    /// answered with "No such option".
    ///
    /// # Errors
    ///
    /// Returns an error only if the exchange itself fails.
    pub fn set_option(
        &mut self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<bool, SessionError> {
        let value = value.into();
        self.send(&ClientCommand::SetOption {
            name: name.to_string(),
            value: value.clone(),
        })?;
        let response = self.synchronize()?;

        if response.contains(OPTION_REJECTED) {
            tracing::warn!(engine = %self.name, option = name, %response, "option rejected");
            self.rejected.push(RejectedOption {
                name: name.to_string(),
                value,
                response,
            });
            return Ok(false);
        }

        self.options.set(name, value);
        Ok(true)
    }

    /// Sends `ucinewgame`; call once before the first search of a game.
    pub fn new_game(&mut self) -> Result<(), SessionError> {
        self.send(&ClientCommand::UciNewGame)?;
        self.synchronize()?;
        Ok(())
    }

    /// Sets the start position followed by `moves`.
    ///
    /// The whole list is resent each time; an empty slice is the start
    /// position itself.
    pub fn set_position(&mut self, moves: &[MoveToken]) -> Result<(), SessionError> {
        self.send(&ClientCommand::Position(PositionSpec::StartPos(moves.to_vec())))?;
        self.synchronize()?;
        Ok(())
    }

    /// Sets an arbitrary position in FEN.
    ///
    /// Some engine builds answer with a static evaluation line; it is
    /// returned when present.
    pub fn set_position_fen(&mut self, fen: &str) -> Result<Option<StaticEval>, SessionError> {
        self.send(&ClientCommand::Position(PositionSpec::Fen(fen.to_string())))?;
        let response = self.synchronize()?;
        Ok(StaticEval::parse(&response))
    }

    /// Starts a search with the configured limit.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSearchLimit`] if the session was configured
    /// without one. Nothing is sent to the engine in that case.
    pub fn go(&mut self) -> Result<(), SessionError> {
        let limit = self.search.ok_or(SessionError::NoSearchLimit)?;
        self.send(&ClientCommand::Go(limit))
    }

    /// Starts a search limited to `nodes` nodes.
    pub fn go_nodes(&mut self, nodes: u64) -> Result<(), SessionError> {
        self.send(&ClientCommand::Go(SearchLimit::Nodes(nodes)))
    }

    /// Searches the current position and returns the engine's choice.
    ///
    /// The score comes from the last line before `bestmove` that carried
    /// one. Without a read timeout this blocks until the engine answers.
    ///
    /// # Errors
    ///
    /// * [`SessionError::NoSearchLimit`] if no search limit is configured.
    /// * [`SessionError::ProtocolTimeout`] if the read timeout elapses first.
    /// * [`SessionError::ProcessTerminated`] if the engine exits mid-search.
    /// * [`SessionError::Malformed`] for a `bestmove` line without a move.
    ///
    /// A timeout or exit closes the session.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use uci::MoveToken;
    /// # use uci_match::session::{SessionConfig, UciSession};
    /// let mut session = UciSession::start("stockfish", SessionConfig::default())?;
    /// session.set_position(&[MoveToken::parse("e2e4")?])?;
    /// let result = session.best_move()?;
    /// assert!(result.score.is_some());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn best_move(&mut self) -> Result<SearchResult, SessionError> {
        self.go()?;
        let deadline = self.deadline();

        let mut info = String::new();
        loop {
            let line = self.read_line(deadline.as_ref())?;
            if starts_with_token(&line, BESTMOVE) {
                let best = BestMove::parse(&line)?;
                let score = extract_score(&info).map(|s| s.mapped());
                tracing::debug!(engine = %self.name, bestmove = %best.mv, ?score, "search finished");
                return Ok(SearchResult {
                    best_move: best.mv,
                    ponder: best.ponder,
                    info,
                    score,
                });
            }
            if has_token(&line, "score") {
                info = line;
            }
        }
    }

    /// Like [`best_move`](Self::best_move) but keeps every parsed `info` line.
    ///
    /// Score-bearing lines that don't fit the full info shape are skipped.
    pub fn search_with_progress(&mut self) -> Result<SearchProgress, SessionError> {
        self.go()?;
        let deadline = self.deadline();

        let mut infos = Vec::new();
        loop {
            let line = self.read_line(deadline.as_ref())?;
            if starts_with_token(&line, BESTMOVE) {
                let best = BestMove::parse(&line)?;
                return Ok(SearchProgress {
                    best_move: best.mv,
                    ponder: best.ponder,
                    infos,
                });
            }
            if has_token(&line, "score") {
                match InfoRecord::parse(&line) {
                    Some(record) => infos.push(record),
                    None => tracing::debug!(engine = %self.name, %line, "skipping malformed info line"),
                }
            }
        }
    }

    /// Every line the engine prints up to and including `bestmove`.
    ///
    /// Call after [`go`](Self::go) or [`go_nodes`](Self::go_nodes).
    pub fn capture_full_text(&mut self) -> Result<Vec<String>, SessionError> {
        let deadline = self.deadline();

        let mut lines = Vec::new();
        loop {
            let line = self.read_line(deadline.as_ref())?;
            let done = starts_with_token(&line, BESTMOVE);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Sends `quit` and releases the engine.
    pub fn quit(mut self) -> Result<(), SessionError> {
        self.send(&ClientCommand::Quit)
    }
}

fn starts_with_token(line: &str, token: &str) -> bool {
    line.split_whitespace().next() == Some(token)
}

fn has_token(line: &str, token: &str) -> bool {
    line.split_whitespace().any(|t| t == token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::scripted::{engine, ScriptedChannel, STOCKFISH_OPTIONS};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lines(list: &[&str]) -> Vec<String> {
        list.iter().map(|l| l.to_string()).collect()
    }

    fn start(channel: ScriptedChannel, config: SessionConfig) -> UciSession<ScriptedChannel> {
        let mut rng = StdRng::seed_from_u64(7);
        UciSession::start_with(channel, config, &mut rng).expect("session should start")
    }

    fn moves(list: &[&str]) -> Vec<MoveToken> {
        list.iter().map(|m| MoveToken::parse(m).unwrap()).collect()
    }

    #[test]
    fn test_handshake_captures_name_and_applies_options() {
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
        let sent = channel.sent();
        let session = start(channel, SessionConfig::default());

        assert_eq!(session.name(), "Scripted 1.0");
        assert!(session.rejected_options().is_empty());
        assert_eq!(session.options().len(), 13);
        assert_eq!(session.options().get("Ponder"), Some(&OptionValue::Bool(false)));

        let sent = sent.borrow();
        assert_eq!(sent[0], "uci");
        assert_eq!(sent[1], "setoption name Ponder value false");
        assert_eq!(sent[2], "isready");
        assert!(sent.contains(&"setoption name Hash value 16".to_string()));
        assert!(sent.contains(&"setoption name Write Debug Log value false".to_string()));
    }

    #[test]
    fn test_ponder_left_alone_when_requested() {
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
        let sent = channel.sent();
        let config = SessionConfig {
            ponder: true,
            ..Default::default()
        };
        let session = start(channel, config);

        assert!(session.options().get("Ponder").is_none());
        assert!(!sent.borrow().iter().any(|l| l.contains("name Ponder")));
    }

    #[test]
    fn test_rejected_option_is_reported_not_fatal() {
        let known: &'static [&'static str] = &[
            "Ponder",
            "Contempt",
            "Threads",
            "Hash",
            "MultiPV",
            "Skill Level",
            "Move Overhead",
            "Slow Mover",
            "UCI_Chess960",
        ];
        let output = lines(&["bestmove e2e4 ponder e7e5"]);
        let mut session = start(
            ScriptedChannel::new(engine(known, output)),
            SessionConfig::default(),
        );

        let rejected: Vec<&str> = session
            .rejected_options()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert!(rejected.contains(&"Contempt Factor"));
        assert!(!rejected.contains(&"Contempt"));
        assert!(session.options().get("Contempt").is_some());
        assert!(session.options().get("Contempt Factor").is_none());
        assert_eq!(
            session.rejected_options()[0].response,
            format!("No such option: {}", session.rejected_options()[0].name)
        );

        // session keeps working
        session.set_position(&[]).unwrap();
        assert_eq!(session.best_move().unwrap().best_move, "e2e4");
    }

    #[test]
    fn test_overrides_win_over_base_table() {
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
        let sent = channel.sent();
        let mut overrides = EngineOptions::new();
        overrides.set("Hash", 128);
        overrides.set("Contempt", 5);
        let config = SessionConfig {
            options: overrides,
            random_contempt: Some(ContemptRange { min: -10, max: 10 }),
            ..Default::default()
        };
        let session = start(channel, config);

        assert_eq!(session.options().get("Hash"), Some(&OptionValue::Int(128)));
        assert_eq!(session.options().get("Contempt"), Some(&OptionValue::Int(5)));
        assert!(!sent.borrow().contains(&"setoption name Hash value 16".to_string()));
    }

    #[test]
    fn test_random_contempt_within_range() {
        for seed in 0..20 {
            let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
            let config = SessionConfig {
                random_contempt: Some(ContemptRange { min: -3, max: 3 }),
                ..Default::default()
            };
            let mut rng = StdRng::seed_from_u64(seed);
            let session = UciSession::start_with(channel, config, &mut rng).unwrap();

            for name in ["Contempt", "Contempt Factor"] {
                match session.options().get(name) {
                    Some(OptionValue::Int(v)) => assert!((-3..=3).contains(v)),
                    other => panic!("{name} should be an integer, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_inverted_contempt_range_is_rejected() {
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
        let config = SessionConfig {
            random_contempt: Some(ContemptRange { min: 10, max: -10 }),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let result = UciSession::start_with(channel, config, &mut rng);
        assert!(matches!(
            result,
            Err(SessionError::InvalidContemptRange(10, -10))
        ));
    }

    #[test]
    fn test_set_position_sends_moves_and_synchronizes() {
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
        let sent = channel.sent();
        let mut session = start(channel, SessionConfig::default());
        sent.borrow_mut().clear();

        session.set_position(&moves(&["e2e4", "e7e5"])).unwrap();
        session.set_position(&[]).unwrap();

        assert_eq!(
            *sent.borrow(),
            lines(&[
                "position startpos moves e2e4 e7e5",
                "isready",
                "position startpos moves",
                "isready",
            ])
        );
    }

    #[test]
    fn test_synchronize_returns_preceding_line() {
        let mut replies = vec![
            lines(&["info string hello", "readyok"]),
            lines(&["readyok"]),
        ]
        .into_iter();
        let channel = ScriptedChannel::new(move |line| match line {
            "uci" => lines(&["uciok"]),
            "isready" => replies.next().unwrap_or_default(),
            _ => vec![],
        });
        // built by hand so the base option table is not applied
        let mut session = UciSession {
            channel,
            name: String::new(),
            search: None,
            read_timeout: None,
            options: EngineOptions::new(),
            rejected: Vec::new(),
            failed: false,
        };
        session.handshake().unwrap();

        assert_eq!(session.name(), "Unknown Engine");
        assert_eq!(session.synchronize().unwrap(), "info string hello");
        assert_eq!(session.synchronize().unwrap(), "");
    }

    #[test]
    fn test_set_position_fen_captures_static_eval() {
        let mut fen_reply = true;
        let mut base = engine(STOCKFISH_OPTIONS, vec![]);
        let channel = ScriptedChannel::new(move |line| {
            if line.starts_with("position fen") && fen_reply {
                fen_reply = false;
                return lines(&["35 -35 24"]);
            }
            base(line)
        });
        let mut session = start(channel, SessionConfig::default());

        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let eval = session.set_position_fen(fen).unwrap();
        assert_eq!(
            eval,
            Some(StaticEval {
                white: 35,
                black: -35,
                phase: 24
            })
        );
        assert_eq!(session.set_position_fen(fen).unwrap(), None);
    }

    #[test]
    fn test_best_move_with_cp_score() {
        let output = lines(&[
            "info depth 5 seldepth 5 multipv 1 score cp 34 nodes 1000 time 12 pv e2e4 e7e5",
            "bestmove e2e4 ponder e7e5",
        ]);
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, output));
        let sent = channel.sent();
        let config = SessionConfig {
            search: Some(SearchLimit::Depth(5)),
            ..Default::default()
        };
        let mut session = start(channel, config);

        let result = session.best_move().unwrap();
        assert_eq!(result.best_move, "e2e4");
        assert_eq!(result.ponder.as_deref(), Some("e7e5"));
        assert_eq!(result.score, Some(34));
        assert!(result.info.starts_with("info depth 5"));
        assert!(sent.borrow().contains(&"go depth 5".to_string()));
    }

    #[test]
    fn test_best_move_uses_last_score_line() {
        let output = lines(&[
            "info depth 1 seldepth 1 multipv 1 score cp 10 nodes 20 time 1 pv d2d4",
            "info depth 2 seldepth 3 multipv 1 score mate 3 nodes 90 time 2 pv g1f3",
            "info depth 2 currmove g1f3 currmovenumber 1",
            "bestmove g1f3 ponder (none)",
        ]);
        let config = SessionConfig {
            search: Some(SearchLimit::MoveTime(100)),
            ..Default::default()
        };
        let mut session = start(ScriptedChannel::new(engine(STOCKFISH_OPTIONS, output)), config);

        let result = session.best_move().unwrap();
        assert_eq!(result.best_move, "g1f3");
        assert_eq!(result.ponder.as_deref(), Some("(none)"));
        assert_eq!(result.score, Some(32765));
    }

    #[test]
    fn test_best_move_without_score() {
        let output = lines(&["info string thinking", "bestmove a2a3"]);
        let mut session = start(
            ScriptedChannel::new(engine(STOCKFISH_OPTIONS, output)),
            SessionConfig::default(),
        );

        let result = session.best_move().unwrap();
        assert_eq!(result.best_move, "a2a3");
        assert_eq!(result.ponder, None);
        assert_eq!(result.score, None);
        assert!(result.info.is_empty());
    }

    #[test]
    fn test_search_with_progress_collects_infos() {
        let output = lines(&[
            "info string NNUE evaluation enabled",
            "info depth 1 seldepth 1 multipv 1 score cp 10 nodes 20 time 1 pv d2d4",
            "info depth 2 score cp 12",
            "info depth 2 seldepth 2 multipv 1 score cp 15 nodes 80 time 2 pv e2e4 e7e5",
            "bestmove e2e4 ponder e7e5",
        ]);
        let mut session = start(
            ScriptedChannel::new(engine(STOCKFISH_OPTIONS, output)),
            SessionConfig::default(),
        );

        let progress = session.search_with_progress().unwrap();
        assert_eq!(progress.best_move, "e2e4");
        assert_eq!(progress.ponder.as_deref(), Some("e7e5"));
        assert_eq!(progress.infos.len(), 2);
        assert_eq!(progress.infos[0].depth, 1);
        assert_eq!(progress.infos[1].mapped_score(), 15);
    }

    #[test]
    fn test_go_without_limit_is_caller_error() {
        let config = SessionConfig {
            search: None,
            ..Default::default()
        };
        let mut session = start(ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![])), config);
        assert!(matches!(session.go(), Err(SessionError::NoSearchLimit)));
        assert!(matches!(
            session.best_move(),
            Err(SessionError::NoSearchLimit)
        ));
    }

    #[test]
    fn test_go_nodes_and_capture_full_text() {
        let output = lines(&[
            "info depth 1 seldepth 1 multipv 1 score cp 3 nodes 500 time 1 pv c2c4",
            "bestmove c2c4 ponder e7e5",
        ]);
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, output.clone()));
        let sent = channel.sent();
        let mut session = start(channel, SessionConfig::default());

        session.go_nodes(500).unwrap();
        assert_eq!(sent.borrow().last().unwrap(), "go nodes 500");
        assert_eq!(session.capture_full_text().unwrap(), output);
    }

    #[test]
    fn test_hung_search_times_out() {
        let config = SessionConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let mut session = start(ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![])), config);
        assert!(matches!(
            session.best_move(),
            Err(SessionError::ProtocolTimeout(d)) if d == Duration::from_millis(20)
        ));
        assert!(session.is_closed());
    }

    #[test]
    fn test_timed_out_session_refuses_further_searches() {
        // first search hangs, the late answer arrives with the second `go`
        let mut searches = 0;
        let mut base = engine(STOCKFISH_OPTIONS, vec![]);
        let channel = ScriptedChannel::new(move |line| {
            if line.starts_with("go") {
                searches += 1;
                return if searches == 1 {
                    vec![]
                } else {
                    lines(&["bestmove e2e4 ponder e7e5", "bestmove d2d4 ponder d7d5"])
                };
            }
            base(line)
        });
        let sent = channel.sent();
        let config = SessionConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let mut session = start(channel, config);
        assert!(session.best_move().is_err());
        sent.borrow_mut().clear();

        assert!(matches!(session.best_move(), Err(SessionError::Closed)));
        assert!(matches!(session.set_position(&[]), Err(SessionError::Closed)));
        assert!(matches!(session.synchronize(), Err(SessionError::Closed)));
        assert!(sent.borrow().is_empty(), "nothing may reach a closed engine");
    }

    #[test]
    fn test_caller_errors_do_not_close_session() {
        let config = SessionConfig {
            search: None,
            ..Default::default()
        };
        let mut session = start(ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![])), config);
        assert!(session.go().is_err());
        assert!(!session.is_closed());
        session.new_game().unwrap();
    }

    #[test]
    fn test_put_sends_raw_line() {
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
        let sent = channel.sent();
        let mut session = start(channel, SessionConfig::default());
        sent.borrow_mut().clear();

        session.put("d").unwrap();
        session.put("eval").unwrap();
        assert_eq!(*sent.borrow(), lines(&["d", "eval"]));
    }

    #[test]
    fn test_engine_exit_is_fatal() {
        let channel = ScriptedChannel::new(|line| match line {
            "uci" => vec!["uciok".to_string()],
            _ => vec![],
        });
        let mut rng = StdRng::seed_from_u64(0);
        let result = UciSession::start_with(channel, SessionConfig::default(), &mut rng);
        assert!(matches!(result, Err(SessionError::ProcessTerminated)));
    }

    #[test]
    fn test_engine_exit_mid_game_closes_session() {
        let mut alive = true;
        let mut base = engine(STOCKFISH_OPTIONS, vec![]);
        let channel = ScriptedChannel::new(move |line| {
            if line == "ucinewgame" {
                alive = false;
            }
            if alive {
                base(line)
            } else {
                vec![]
            }
        });
        let mut session = start(channel, SessionConfig::default());

        assert!(matches!(
            session.new_game(),
            Err(SessionError::ProcessTerminated)
        ));
        assert!(session.is_closed());
        assert!(matches!(session.quit(), Err(SessionError::Closed)));
    }

    #[test]
    fn test_new_game_and_quit() {
        let channel = ScriptedChannel::new(engine(STOCKFISH_OPTIONS, vec![]));
        let sent = channel.sent();
        let mut session = start(channel, SessionConfig::default());
        sent.borrow_mut().clear();

        session.new_game().unwrap();
        session.quit().unwrap();
        assert_eq!(*sent.borrow(), lines(&["ucinewgame", "isready", "quit"]));
    }
}
