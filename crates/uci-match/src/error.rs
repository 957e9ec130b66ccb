//! Errors raised while talking to an engine process.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with a UCI engine.
///
/// Every variant is fatal to the session that raised it; nothing here is
/// retried. Rejected options and unparseable `info` lines are not errors and
/// never show up as one.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The engine executable could not be started.
    #[error("Failed to launch engine {path}: {source}")]
    EngineLaunchFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The engine process went away while a command was written or a reply read.
    #[error("Engine process terminated")]
    ProcessTerminated,
    /// No complete reply arrived before the read deadline.
    #[error("Engine did not respond within {0:?}")]
    ProtocolTimeout(Duration),
    /// An earlier call already failed with one of the fatal errors above.
    #[error("Session closed after a fatal engine error")]
    Closed,
    /// The session was asked to search without a depth, movetime or node limit.
    #[error("No search limit configured")]
    NoSearchLimit,
    /// Random contempt was requested with `min` above `max`.
    #[error("Invalid contempt range: {0}..={1}")]
    InvalidContemptRange(i64, i64),
    /// A `bestmove` line without a move.
    #[error("Malformed engine output: {0}")]
    Malformed(#[from] uci::ParseError),
    /// Any other I/O failure on the engine's pipes.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
