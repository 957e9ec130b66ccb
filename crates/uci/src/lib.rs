//! Client-side UCI (Universal Chess Interface) protocol library.
//!
//! This crate covers the text a GUI or match runner exchanges with a chess
//! engine process. It performs no I/O: commands are rendered to strings and
//! engine output is parsed one line at a time.
//!
//! # Commands sent
//!
//! - `uci` / `isready` / `ucinewgame` - Handshake and synchronization
//! - `setoption name <name> value <value>` - Engine configuration
//! - `position startpos moves <move>...` / `position fen <fen>` - Set position
//! - `go depth <d>` / `go movetime <ms>` / `go nodes <n>` - Start search
//! - `stop` / `quit`
//!
//! # Lines consumed
//!
//! - `readyok` - Synchronization marker
//! - `info depth .. seldepth .. multipv .. score .. nodes .. time .. pv ..`
//! - `bestmove <move> ponder <move>`

mod command;
mod info;
mod mv;
mod option;

pub use command::{ClientCommand, PositionSpec, SearchLimit};
pub use info::{
    extract_score, predicts_no_reply, BestMove, InfoRecord, Score, StaticEval, MATE_SCORE,
};
pub use mv::{join_moves, MoveToken};
pub use option::{EngineOptions, OptionValue};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid move token: {0}")]
    InvalidMove(String),
    #[error("Not a bestmove line: {0}")]
    NotBestMove(String),
}

/// Engine output line that terminates a `go` search.
pub const BESTMOVE: &str = "bestmove";

/// Engine reply to `isready`.
pub const READYOK: &str = "readyok";

/// Engine reply closing the `uci` handshake.
pub const UCIOK: &str = "uciok";

/// Ponder token an engine reports when it has no expected reply.
pub const NO_PONDER: &str = "(none)";
