//! JSON export of match results.
//!
//! A report carries the two identities, the result and every move with the
//! engine that played it, its predicted reply and its mapped score.
//!
//! ```json
//! {
//!   "white": "deep",
//!   "black": "quick",
//!   "result": "white",
//!   "winner": "deep",
//!   "plies": 2,
//!   "moves": [
//!     { "uci": "e2e4", "engine": "deep", "ponder": "e7e5", "score": 34 },
//!     { "uci": "e7e5", "engine": "quick", "ponder": "g1f3", "score": -30 }
//!   ]
//! }
//! ```

use crate::channel::LineChannel;
use crate::orchestrator::{Match, MatchOutcome, MoveRecord};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Serializable view of a match.
#[derive(Debug, Serialize)]
pub struct MatchReport<'a> {
    /// Identity that played white.
    pub white: &'a str,
    /// Identity that played black.
    pub black: &'a str,
    /// `"white"`, `"black"`, `"draw"` or `"unfinished"`.
    pub result: &'static str,
    /// Winning identity, absent for draws and unfinished matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<&'a str>,
    /// Number of moves played.
    pub plies: usize,
    /// Every move in order, with the engine that played it.
    pub moves: &'a [MoveRecord],
}

impl<'a> MatchReport<'a> {
    /// Builds a report from the parts of a match.
    ///
    /// `result` is derived from `outcome`: a decided match names the colour
    /// its winner played, so `white` must be the identity that had white.
    pub fn new(
        white: &'a str,
        black: &'a str,
        outcome: &'a MatchOutcome,
        moves: &'a [MoveRecord],
    ) -> Self {
        let (result, winner) = match outcome {
            MatchOutcome::InProgress => ("unfinished", None),
            MatchOutcome::Drawn => ("draw", None),
            MatchOutcome::Decided(name) if name == white => ("white", Some(name.as_str())),
            MatchOutcome::Decided(name) => ("black", Some(name.as_str())),
        };

        Self {
            white,
            black,
            result,
            winner,
            plies: moves.len(),
            moves,
        }
    }

    /// Report for the current state of `game`.
    pub fn from_match<C: LineChannel>(game: &'a Match<C>) -> Self {
        Self::new(game.white(), game.black(), game.outcome(), game.records())
    }
}

/// Writes `report` as pretty-printed JSON to `writer`.
pub fn write_report<W: Write>(writer: W, report: &MatchReport<'_>) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(writer, report)
}

/// Writes `report` to a JSON file at `path`.
///
/// # Errors
///
/// Returns an `std::io::Error` if the file cannot be created or written to.
pub fn write_json<P: AsRef<Path>>(path: P, report: &MatchReport<'_>) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_report(file, report)?;
    Ok(())
}
