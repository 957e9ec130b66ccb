//! Turn-taking match between two UCI engines.
//!
//! A [`Match`] owns two [`UciSession`]s, assigns colours at random and asks
//! the side to move for a move until one engine announces a forced mate or
//! the ply cap ends the game as a draw. The orchestrator keeps no board: the
//! only position it knows is the list of moves played so far.

use crate::channel::{LineChannel, ProcessChannel};
use crate::error::SessionError;
use crate::session::{SearchResult, UciSession};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use uci::{extract_score, MoveToken, Score};

/// Plies after which a match is drawn regardless of what the engines think.
pub const PLY_CAP: usize = 200;

/// Errors that can occur while running a match.
#[derive(Error, Debug)]
pub enum MatchError {
    /// An error occurred while communicating with a UCI engine.
    #[error("UCI error: {0}")]
    Session(#[from] SessionError),
    /// A match was set up with other than two engines.
    #[error("A match needs exactly two engines, got {0}")]
    EngineCount(usize),
    /// An engine answered with something that is not a move.
    #[error("Invalid move from {engine}: {mv}")]
    InvalidMove { engine: String, mv: String },
}

/// State of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Moves are still being played.
    InProgress,
    /// The named engine won.
    Decided(String),
    /// The ply cap was reached.
    Drawn,
}

/// A single move with the engine that played it and its search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    /// The move in UCI notation.
    pub uci: MoveToken,
    /// Identity of the engine that played it.
    pub engine: String,
    /// Predicted reply, `(none)` when the engine had none.
    pub ponder: Option<String>,
    /// Mapped score of the last scored info line, if any.
    pub score: Option<i32>,
}

/// Runs a game between two engine sessions.
///
/// # Example
///
/// ```no_run
/// use std::collections::BTreeMap;
/// use uci::SearchLimit;
/// use uci_match::orchestrator::Match;
/// use uci_match::session::{SessionConfig, UciSession};
///
/// let deep = SessionConfig { search: Some(SearchLimit::Depth(20)), ..Default::default() };
/// let shallow = SessionConfig { search: Some(SearchLimit::Depth(10)), ..Default::default() };
///
/// let mut engines = BTreeMap::new();
/// engines.insert("deep".to_string(), UciSession::start("stockfish", deep)?);
/// engines.insert("shallow".to_string(), UciSession::start("stockfish", shallow)?);
///
/// let mut game = Match::new(engines, &mut rand::rng())?;
/// match game.run()? {
///     Some(winner) => println!("{} wins", winner),
///     None => println!("draw"),
/// }
/// # Ok::<(), uci_match::orchestrator::MatchError>(())
/// ```
pub struct Match<C: LineChannel = ProcessChannel> {
    white_name: String,
    white: UciSession<C>,
    black_name: String,
    black: UciSession<C>,
    moves: Vec<MoveToken>,
    records: Vec<MoveRecord>,
    outcome: MatchOutcome,
}

impl<C: LineChannel> Match<C> {
    /// Sets up a match between the two engines in `engines`.
    ///
    /// White is picked uniformly at random; both engines receive
    /// `ucinewgame` before the first move.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::EngineCount`] unless exactly two engines are
    /// given, or a session error if either engine fails to reset.
    pub fn new<R: Rng + ?Sized>(
        engines: BTreeMap<String, UciSession<C>>,
        rng: &mut R,
    ) -> Result<Self, MatchError> {
        let count = engines.len();
        if count != 2 {
            return Err(MatchError::EngineCount(count));
        }

        let mut engines = engines.into_iter();
        let (first, second) = match (engines.next(), engines.next()) {
            (Some(first), Some(second)) => (first, second),
            _ => return Err(MatchError::EngineCount(count)),
        };
        let ((white_name, mut white), (black_name, mut black)) = if rng.random_bool(0.5) {
            (second, first)
        } else {
            (first, second)
        };

        white.new_game()?;
        black.new_game()?;

        tracing::info!(white = %white_name, black = %black_name, "match started");

        Ok(Self {
            white_name,
            white,
            black_name,
            black,
            moves: Vec::new(),
            records: Vec::new(),
            outcome: MatchOutcome::InProgress,
        })
    }

    /// Identity playing white.
    pub fn white(&self) -> &str {
        &self.white_name
    }

    /// Identity playing black.
    pub fn black(&self) -> &str {
        &self.black_name
    }

    /// Moves played so far, one per ply.
    pub fn moves(&self) -> &[MoveToken] {
        &self.moves
    }

    /// Per-ply detail: who moved, the predicted reply and the mapped score.
    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    /// Current state; [`MatchOutcome::InProgress`] until `advance` stops.
    pub fn outcome(&self) -> &MatchOutcome {
        &self.outcome
    }

    /// The winning identity once the match is decided.
    pub fn winner(&self) -> Option<&str> {
        match &self.outcome {
            MatchOutcome::Decided(winner) => Some(winner),
            _ => None,
        }
    }

    /// Plays one ply.
    ///
    /// The engine to move gets the full move list from the start position
    /// and searches it. Its move is appended even when it ends the match.
    ///
    /// # Returns
    ///
    /// `Ok(true)` while the match goes on, `Ok(false)` once no further move
    /// will be played: the ply cap was passed (the match is drawn) or an
    /// engine announced a forced mate.
    ///
    /// # Errors
    ///
    /// * [`MatchError::Session`] if either engine fails; the session that
    ///   failed is closed and the match cannot continue.
    /// * [`MatchError::InvalidMove`] if the engine answers with something
    ///   that is not a move.
    pub fn advance(&mut self) -> Result<bool, MatchError> {
        if self.outcome != MatchOutcome::InProgress {
            return Ok(false);
        }
        if self.moves.len() > PLY_CAP {
            tracing::info!(plies = self.moves.len(), "ply cap reached, match drawn");
            self.outcome = MatchOutcome::Drawn;
            return Ok(false);
        }

        let (active_name, active, inactive_name) = if self.moves.len() % 2 == 0 {
            (&self.white_name, &mut self.white, &self.black_name)
        } else {
            (&self.black_name, &mut self.black, &self.white_name)
        };

        active.set_position(&self.moves)?;
        let result = active.best_move()?;

        let mv = MoveToken::parse(&result.best_move).map_err(|_| MatchError::InvalidMove {
            engine: active_name.clone(),
            mv: result.best_move.clone(),
        })?;

        tracing::debug!(
            ply = self.moves.len() + 1,
            engine = %active_name,
            mv = %mv,
            score = ?result.score,
            "move played"
        );

        let decision = decide(&result, active_name, inactive_name);

        self.records.push(MoveRecord {
            uci: mv.clone(),
            engine: active_name.clone(),
            ponder: result.ponder,
            score: result.score,
        });
        self.moves.push(mv);

        if let Some(winner) = decision {
            tracing::info!(winner = %winner, plies = self.moves.len(), "match decided");
            self.outcome = MatchOutcome::Decided(winner);
        }

        Ok(self.outcome == MatchOutcome::InProgress)
    }

    /// Plays until the match is decided or drawn.
    ///
    /// Returns the winning identity, or `None` for a draw.
    pub fn run(&mut self) -> Result<Option<String>, MatchError> {
        while self.advance()? {}
        Ok(self.winner().map(str::to_string))
    }

    /// Hands both sessions back, white first.
    pub fn into_sessions(self) -> (UciSession<C>, UciSession<C>) {
        (self.white, self.black)
    }
}

/// Winner implied by a search result, if any.
///
/// Only a search that predicts no reply can end the match, and only when its
/// info line reports a mate: a positive count credits the engine that moved,
/// a negative one its opponent. Anything else leaves the match running.
fn decide(result: &SearchResult, active: &str, inactive: &str) -> Option<String> {
    if !result.has_no_ponder() || !result.info.contains("mate") {
        return None;
    }

    match extract_score(&result.info) {
        Some(Score::Mate(n)) if n > 0 => Some(active.to_string()),
        Some(Score::Mate(n)) if n < 0 => Some(inactive.to_string()),
        _ => None,
    }
}
